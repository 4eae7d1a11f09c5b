//! Shape of the module table
//!
//! The counts that identifier validation needs, frozen at startup. The
//! topology is shared with interrupt-side event senders, so it holds no
//! handler or configuration state.

use alloc::vec::Vec;

use crate::id::{Id, IdKind};

#[derive(Debug, Clone)]
pub(crate) struct ModuleShape {
    pub api_count: usize,
    pub event_count: usize,
    pub notification_count: usize,
    pub sub_element_counts: Vec<usize>,
    /// Entity slot of the module; its elements follow it.
    pub slot: usize,
}

impl ModuleShape {
    pub fn element_count(&self) -> usize {
        self.sub_element_counts.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    modules: Vec<ModuleShape>,
    slot_count: usize,
}

impl Topology {
    /// Builds the topology, assigning consecutive entity slots.
    pub(crate) fn new<I>(shapes: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, usize, Vec<usize>)>,
    {
        let mut slot_count = 0;
        let modules = shapes
            .into_iter()
            .map(|(api_count, event_count, notification_count, sub_element_counts)| {
                let slot = slot_count;
                slot_count += 1 + sub_element_counts.len();
                ModuleShape { api_count, event_count, notification_count, sub_element_counts, slot }
            })
            .collect();
        Self { modules, slot_count }
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of modules plus elements.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub(crate) fn shape(&self, module_idx: usize) -> Option<&ModuleShape> {
        self.modules.get(module_idx)
    }

    pub(crate) fn shapes(&self) -> impl Iterator<Item = &ModuleShape> {
        self.modules.iter()
    }

    pub fn is_valid_module_id(&self, id: Id) -> bool {
        matches!(id.decode(), IdKind::Module { module } if module < self.modules.len())
    }

    pub fn is_valid_element_id(&self, id: Id) -> bool {
        match id.decode() {
            IdKind::Element { module, element } => {
                self.shape(module).map_or(false, |m| element < m.element_count())
            }
            _ => false,
        }
    }

    pub fn is_valid_sub_element_id(&self, id: Id) -> bool {
        match id.decode() {
            IdKind::SubElement { module, element, sub_element } => self
                .shape(module)
                .and_then(|m| m.sub_element_counts.get(element))
                .map_or(false, |&count| sub_element < count),
            _ => false,
        }
    }

    /// Module, element or sub-element of the image.
    pub fn is_valid_entity_id(&self, id: Id) -> bool {
        self.is_valid_module_id(id) || self.is_valid_element_id(id) || self.is_valid_sub_element_id(id)
    }

    pub fn is_valid_api_id(&self, id: Id) -> bool {
        match id.decode() {
            IdKind::Api { module, api } => self.shape(module).map_or(false, |m| api < m.api_count),
            _ => false,
        }
    }

    pub fn is_valid_event_id(&self, id: Id) -> bool {
        match id.decode() {
            IdKind::Event { module, event } => {
                self.shape(module).map_or(false, |m| event < m.event_count)
            }
            _ => false,
        }
    }

    /// Always `false` when notifications are compiled out.
    pub fn is_valid_notification_id(&self, id: Id) -> bool {
        if !cfg!(feature = "notification") {
            return false;
        }
        match id.decode() {
            IdKind::Notification { module, notification } => {
                self.shape(module).map_or(false, |m| notification < m.notification_count)
            }
            _ => false,
        }
    }

    /// Slot of the module or element owning `id`. Sub-elements share their
    /// element's slot. `None` for anything that is not a valid entity.
    pub fn entity_slot(&self, id: Id) -> Option<usize> {
        if !self.is_valid_entity_id(id) {
            return None;
        }
        let shape = self.shape(id.module_idx())?;
        match id.decode() {
            IdKind::Module { .. } => Some(shape.slot),
            IdKind::Element { element, .. } | IdKind::SubElement { element, .. } => {
                Some(shape.slot + 1 + element)
            }
            _ => None,
        }
    }
}
