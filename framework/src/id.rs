//! Entity identifiers
//!
//! Every addressable thing in the firmware (modules, elements, sub-elements,
//! APIs, events and notifications) is named by a 32-bit [`Id`]. The low four
//! bits carry a type tag; the remaining fields depend on the tag:
//!
//! ```text
//!  31        24 23             12 11      4 3    0
//! +------------+-----------------+---------+------+
//! | sub_elem   | element         | module  | type |   ELEMENT / SUB_ELEMENT
//! +------------+---------+-------+---------+------+
//! |            |         | api   | module  | type |   API (bits 12..16)
//! +------------+---------+-------+---------+------+
//! |            |     | event/not | module  | type |   EVENT / NOTIFICATION (bits 12..18)
//! +------------+-----------------+---------+------+
//! ```
//!
//! Accessors that expect a particular tag panic on misuse in every build
//! profile; formatting and [`Id::decode`] never do.

use core::fmt;

const TYPE_SHIFT: u32 = 0;
const TYPE_MASK: u32 = 0x0000_000F;
const MODULE_SHIFT: u32 = 4;
const MODULE_MASK: u32 = 0x0000_0FF0;
const ELEMENT_SHIFT: u32 = 12;
const ELEMENT_MASK: u32 = 0x00FF_F000;
const SUB_ELEMENT_SHIFT: u32 = 24;
const SUB_ELEMENT_MASK: u32 = 0xFF00_0000;
const API_SHIFT: u32 = 12;
const API_MASK: u32 = 0x0000_F000;
const EVENT_SHIFT: u32 = 12;
const EVENT_MASK: u32 = 0x0003_F000;
const NOTIFICATION_SHIFT: u32 = 12;
const NOTIFICATION_MASK: u32 = 0x0003_F000;

/// Number of addressable modules.
pub const MODULE_IDX_MAX: usize = 1 << 8;
/// Number of addressable elements per module.
pub const ELEMENT_IDX_MAX: usize = 1 << 12;
/// Number of addressable sub-elements per element.
pub const SUB_ELEMENT_IDX_MAX: usize = 1 << 8;
/// Number of addressable APIs per module.
pub const API_IDX_MAX: usize = 1 << 4;
/// Number of addressable events per module.
pub const EVENT_IDX_MAX: usize = 1 << 6;
/// Number of addressable notifications per module.
pub const NOTIFICATION_IDX_MAX: usize = 1 << 6;

const TAG_INVALID: u32 = 0;
const TAG_NONE: u32 = 1;
const TAG_MODULE: u32 = 2;
const TAG_ELEMENT: u32 = 3;
const TAG_SUB_ELEMENT: u32 = 4;
const TAG_API: u32 = 5;
const TAG_EVENT: u32 = 6;
const TAG_NOTIFICATION: u32 = 7;
const TAG_COUNT: u32 = 8;

/// Kind of entity an [`Id`] refers to.
///
/// `INVALID` is deliberately absent: an id with that tag has no type and the
/// typed queries refuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IdType {
    None = TAG_NONE as u8,
    Module = TAG_MODULE as u8,
    Element = TAG_ELEMENT as u8,
    SubElement = TAG_SUB_ELEMENT as u8,
    Api = TAG_API as u8,
    Event = TAG_EVENT as u8,
    Notification = TAG_NOTIFICATION as u8,
}

/// Fully decoded view of an [`Id`], for exhaustive matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// Tag 0 or an out-of-range tag.
    Invalid,
    None,
    Module { module: usize },
    Element { module: usize, element: usize },
    SubElement { module: usize, element: usize, sub_element: usize },
    Api { module: usize, api: usize },
    Event { module: usize, event: usize },
    Notification { module: usize, notification: usize },
}

/// 32-bit tagged entity identifier.
///
/// The all-zero value is [`Id::INVALID`], which is also the `Default`.
/// Equality is raw 32-bit equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Id(u32);

impl Id {
    /// The invalid identifier.
    pub const INVALID: Id = Id(TAG_INVALID);

    /// The "no entity" identifier.
    pub const NONE: Id = Id(TAG_NONE);

    const fn field(value: usize, shift: u32, mask: u32) -> u32 {
        ((value as u32) << shift) & mask
    }

    const fn pack_module(tag: u32, module_idx: usize) -> u32 {
        Self::field(tag as usize, TYPE_SHIFT, TYPE_MASK)
            | Self::field(module_idx, MODULE_SHIFT, MODULE_MASK)
    }

    /// Module identifier.
    pub const fn module(module_idx: usize) -> Id {
        assert!(module_idx < MODULE_IDX_MAX, "module index out of range");
        Id(Self::pack_module(TAG_MODULE, module_idx))
    }

    /// Element identifier.
    pub const fn element(module_idx: usize, element_idx: usize) -> Id {
        assert!(module_idx < MODULE_IDX_MAX, "module index out of range");
        assert!(element_idx < ELEMENT_IDX_MAX, "element index out of range");
        Id(Self::pack_module(TAG_ELEMENT, module_idx)
            | Self::field(element_idx, ELEMENT_SHIFT, ELEMENT_MASK))
    }

    /// Sub-element identifier.
    pub const fn sub_element(module_idx: usize, element_idx: usize, sub_element_idx: usize) -> Id {
        assert!(module_idx < MODULE_IDX_MAX, "module index out of range");
        assert!(element_idx < ELEMENT_IDX_MAX, "element index out of range");
        assert!(sub_element_idx < SUB_ELEMENT_IDX_MAX, "sub-element index out of range");
        Id(Self::pack_module(TAG_SUB_ELEMENT, module_idx)
            | Self::field(element_idx, ELEMENT_SHIFT, ELEMENT_MASK)
            | Self::field(sub_element_idx, SUB_ELEMENT_SHIFT, SUB_ELEMENT_MASK))
    }

    /// API identifier.
    pub const fn api(module_idx: usize, api_idx: usize) -> Id {
        assert!(module_idx < MODULE_IDX_MAX, "module index out of range");
        assert!(api_idx < API_IDX_MAX, "API index out of range");
        Id(Self::pack_module(TAG_API, module_idx) | Self::field(api_idx, API_SHIFT, API_MASK))
    }

    /// Event identifier.
    pub const fn event(module_idx: usize, event_idx: usize) -> Id {
        assert!(module_idx < MODULE_IDX_MAX, "module index out of range");
        assert!(event_idx < EVENT_IDX_MAX, "event index out of range");
        Id(Self::pack_module(TAG_EVENT, module_idx)
            | Self::field(event_idx, EVENT_SHIFT, EVENT_MASK))
    }

    /// Notification identifier.
    pub const fn notification(module_idx: usize, notification_idx: usize) -> Id {
        assert!(module_idx < MODULE_IDX_MAX, "module index out of range");
        assert!(notification_idx < NOTIFICATION_IDX_MAX, "notification index out of range");
        Id(Self::pack_module(TAG_NOTIFICATION, module_idx)
            | Self::field(notification_idx, NOTIFICATION_SHIFT, NOTIFICATION_MASK))
    }

    /// Reinterprets a raw 32-bit value. No validation takes place.
    pub const fn from_raw(raw: u32) -> Id {
        Id(raw)
    }

    /// Raw 32-bit value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    const fn tag(self) -> u32 {
        (self.0 & TYPE_MASK) >> TYPE_SHIFT
    }

    const fn raw_module_idx(self) -> usize {
        ((self.0 & MODULE_MASK) >> MODULE_SHIFT) as usize
    }

    const fn raw_element_idx(self) -> usize {
        ((self.0 & ELEMENT_MASK) >> ELEMENT_SHIFT) as usize
    }

    const fn raw_sub_element_idx(self) -> usize {
        ((self.0 & SUB_ELEMENT_MASK) >> SUB_ELEMENT_SHIFT) as usize
    }

    /// Whether the tag is one of the defined, non-INVALID types.
    pub const fn is_type_valid(self) -> bool {
        let tag = self.tag();
        tag != TAG_INVALID && tag < TAG_COUNT
    }

    /// Whether the id is of type `ty`.
    ///
    /// # Panics
    ///
    /// If the id's own tag is INVALID or out of range.
    pub fn is_type(self, ty: IdType) -> bool {
        assert!(self.is_type_valid(), "id type check on invalid id {:#010x}", self.0);
        self.tag() == ty as u32
    }

    /// Type of the id.
    ///
    /// # Panics
    ///
    /// If the id's tag is INVALID or out of range.
    pub fn get_type(self) -> IdType {
        match self.tag() {
            TAG_NONE => IdType::None,
            TAG_MODULE => IdType::Module,
            TAG_ELEMENT => IdType::Element,
            TAG_SUB_ELEMENT => IdType::SubElement,
            TAG_API => IdType::Api,
            TAG_EVENT => IdType::Event,
            TAG_NOTIFICATION => IdType::Notification,
            _ => panic!("type of invalid id {:#010x}", self.0),
        }
    }

    /// Raw equality with a precondition on the left-hand side only.
    ///
    /// # Panics
    ///
    /// If `self` has an INVALID or out-of-range tag. `other` is not checked.
    pub fn is_equal(self, other: Id) -> bool {
        assert!(self.is_type_valid(), "comparison against invalid id {:#010x}", self.0);
        self.0 == other.0
    }

    fn expect_module_bearing(self) {
        let tag = self.tag();
        assert!(
            tag != TAG_INVALID && tag != TAG_NONE && tag < TAG_COUNT,
            "id {:#010x} has no module index",
            self.0
        );
    }

    fn expect_tag(self, tag: u32, what: &str) {
        assert!(self.tag() == tag, "id {:#010x} is not {}", self.0, what);
    }

    /// Module index of any module-bearing id.
    pub fn module_idx(self) -> usize {
        self.expect_module_bearing();
        self.raw_module_idx()
    }

    /// Element index of an ELEMENT or SUB_ELEMENT id.
    pub fn element_idx(self) -> usize {
        let tag = self.tag();
        assert!(
            tag == TAG_ELEMENT || tag == TAG_SUB_ELEMENT,
            "id {:#010x} has no element index",
            self.0
        );
        self.raw_element_idx()
    }

    /// Sub-element index of a SUB_ELEMENT id.
    pub fn sub_element_idx(self) -> usize {
        self.expect_tag(TAG_SUB_ELEMENT, "a sub-element");
        self.raw_sub_element_idx()
    }

    /// API index of an API id.
    pub fn api_idx(self) -> usize {
        self.expect_tag(TAG_API, "an API");
        ((self.0 & API_MASK) >> API_SHIFT) as usize
    }

    /// Event index of an EVENT id.
    pub fn event_idx(self) -> usize {
        self.expect_tag(TAG_EVENT, "an event");
        ((self.0 & EVENT_MASK) >> EVENT_SHIFT) as usize
    }

    /// Notification index of a NOTIFICATION id.
    pub fn notification_idx(self) -> usize {
        self.expect_tag(TAG_NOTIFICATION, "a notification");
        ((self.0 & NOTIFICATION_MASK) >> NOTIFICATION_SHIFT) as usize
    }

    /// Module id of the module that owns this entity.
    pub fn build_module_id(self) -> Id {
        Id::module(self.module_idx())
    }

    /// Element `element_idx` of the module that owns this entity.
    pub fn build_element_id(self, element_idx: usize) -> Id {
        Id::element(self.module_idx(), element_idx)
    }

    /// Sub-element `sub_element_idx` of this element.
    ///
    /// # Panics
    ///
    /// If `self` is not an ELEMENT id.
    pub fn build_sub_element_id(self, sub_element_idx: usize) -> Id {
        self.expect_tag(TAG_ELEMENT, "an element");
        Id::sub_element(self.raw_module_idx(), self.raw_element_idx(), sub_element_idx)
    }

    /// API `api_idx` of the module that owns this entity.
    pub fn build_api_id(self, api_idx: usize) -> Id {
        Id::api(self.module_idx(), api_idx)
    }

    /// Decodes the id without any assertion.
    pub const fn decode(self) -> IdKind {
        let module = self.raw_module_idx();
        match self.tag() {
            TAG_NONE => IdKind::None,
            TAG_MODULE => IdKind::Module { module },
            TAG_ELEMENT => IdKind::Element { module, element: self.raw_element_idx() },
            TAG_SUB_ELEMENT => IdKind::SubElement {
                module,
                element: self.raw_element_idx(),
                sub_element: self.raw_sub_element_idx(),
            },
            TAG_API => IdKind::Api { module, api: ((self.0 & API_MASK) >> API_SHIFT) as usize },
            TAG_EVENT => {
                IdKind::Event { module, event: ((self.0 & EVENT_MASK) >> EVENT_SHIFT) as usize }
            }
            TAG_NOTIFICATION => IdKind::Notification {
                module,
                notification: ((self.0 & NOTIFICATION_MASK) >> NOTIFICATION_SHIFT) as usize,
            },
            _ => IdKind::Invalid,
        }
    }

    /// Module index when the id carries one, without asserting.
    pub const fn try_module_idx(self) -> Option<usize> {
        match self.decode() {
            IdKind::Invalid | IdKind::None => None,
            _ => Some(self.raw_module_idx()),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            IdKind::Invalid => f.write_str("[INV]"),
            IdKind::None => f.write_str("[NON]"),
            IdKind::Module { module } => write!(f, "[MOD {}]", module),
            IdKind::Element { module, element } => write!(f, "[ELM {}:{}]", module, element),
            IdKind::SubElement { module, element, sub_element } => {
                write!(f, "[SUB {}:{}:{}]", module, element, sub_element)
            }
            IdKind::Api { module, api } => write!(f, "[API {}:{}]", module, api),
            IdKind::Event { module, event } => write!(f, "[EVT {}:{}]", module, event),
            IdKind::Notification { module, notification } => {
                write!(f, "[NOT {}:{}]", module, notification)
            }
        }
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<Id> for u32 {
    fn from(id: Id) -> u32 {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn invalid_is_zero_and_default() {
        assert_eq!(Id::INVALID.raw(), 0);
        assert_eq!(Id::default(), Id::INVALID);
        assert!(!Id::INVALID.is_type_valid());
        assert!(Id::NONE.is_type_valid());
    }

    #[test]
    fn constructors_round_trip() {
        let sub = Id::sub_element(255, 4095, 255);
        assert_eq!(sub.module_idx(), 255);
        assert_eq!(sub.element_idx(), 4095);
        assert_eq!(sub.sub_element_idx(), 255);
        assert_eq!(sub.get_type(), IdType::SubElement);

        let api = Id::api(7, 15);
        assert_eq!(api.module_idx(), 7);
        assert_eq!(api.api_idx(), 15);

        let event = Id::event(9, 63);
        assert_eq!(event.event_idx(), 63);
        assert!(event.is_type(IdType::Event));

        let notification = Id::notification(9, 1);
        assert_eq!(notification.notification_idx(), 1);
        assert!(!notification.is_type(IdType::Event));
    }

    #[test]
    fn module_five_element_build() {
        let module = Id::module(5);
        let element = module.build_element_id(2);
        assert_eq!(element, Id::element(5, 2));
        assert_eq!(element.module_idx(), 5);
        assert_eq!(element.element_idx(), 2);

        let sub = element.build_sub_element_id(1);
        assert_eq!(sub.element_idx(), 2);
        assert_eq!(sub.build_module_id(), module);
        assert_eq!(format!("{}", sub), "[SUB 5:2:1]");
    }

    #[test]
    fn equality_is_raw() {
        let a = Id::element(1, 0);
        assert!(a.is_equal(a));
        assert!(!a.is_equal(Id::element(1, 1)));
        assert!(!a.is_equal(Id::module(1)));
        // Only the left operand is checked.
        assert!(!a.is_equal(Id::INVALID));
    }

    #[test]
    #[should_panic]
    fn equality_rejects_invalid_left_operand() {
        Id::INVALID.is_equal(Id::module(0));
    }

    #[test]
    #[should_panic]
    fn element_idx_on_module_panics() {
        Id::module(3).element_idx();
    }

    #[test]
    #[should_panic]
    fn sub_element_build_requires_element() {
        Id::module(3).build_sub_element_id(0);
    }

    #[test]
    #[should_panic]
    fn get_type_on_out_of_range_tag_panics() {
        Id::from_raw(0xF).get_type();
    }

    #[test]
    #[should_panic]
    fn module_idx_on_none_panics() {
        Id::NONE.module_idx();
    }

    #[test]
    fn format_never_panics() {
        assert_eq!(format!("{}", Id::module(3)), "[MOD 3]");
        assert_eq!(format!("{}", Id::element(3, 2)), "[ELM 3:2]");
        assert_eq!(format!("{}", Id::api(3, 1)), "[API 3:1]");
        assert_eq!(format!("{}", Id::event(3, 0)), "[EVT 3:0]");
        assert_eq!(format!("{}", Id::notification(3, 0)), "[NOT 3:0]");
        assert_eq!(format!("{}", Id::NONE), "[NON]");
        assert_eq!(format!("{}", Id::INVALID), "[INV]");
        assert_eq!(format!("{:?}", Id::from_raw(0x0000_0FF9)), "[INV]");
    }

    #[test]
    fn decode_matches_constructors() {
        assert_eq!(Id::api(2, 3).decode(), IdKind::Api { module: 2, api: 3 });
        assert_eq!(Id::from_raw(8).decode(), IdKind::Invalid);
        assert_eq!(Id::NONE.try_module_idx(), None);
        assert_eq!(Id::event(4, 1).try_module_idx(), Some(4));
    }

    #[test]
    fn const_tables_build() {
        const TABLE: [Id; 2] = [Id::element(1, 0), Id::element(1, 1)];
        assert_eq!(TABLE[1].element_idx(), 1);
    }
}
