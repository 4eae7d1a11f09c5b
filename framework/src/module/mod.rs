//! Modules
//!
//! A firmware image is a fixed list of [`ModuleEntry`]s. Module `n` in the
//! list is addressed as `Id::module(n)`; its elements come from the
//! [`ElementTable`] in its [`ModuleConfig`].
//!
//! Handlers implement [`Module`]. The framework owns them and hands each
//! call a `&mut Framework`, so a handler can queue events, bind to other
//! modules or read configuration while it runs.

mod registry;
mod topology;

pub(crate) use registry::{ModuleContext, Registry};
pub(crate) use topology::Topology;

use alloc::boxed::Box;
use core::any::Any;

use crate::event::{Event, Progress};
use crate::framework::Framework;
use crate::id::Id;
use crate::status::{FwkError, FwkResult};

/// Number of bind rounds. Rounds are numbered from 0.
pub const BIND_ROUND_COUNT: u32 = 2;

/// API handed out by [`Module::process_bind_request`].
pub type ApiRef = &'static (dyn Any + Send + Sync);

/// Opaque configuration data of a module or element.
pub type ConfigData = &'static (dyn Any + Send + Sync);

/// Module category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    /// Hardware abstraction layer
    Hal,
    /// Device driver
    Driver,
    /// Protocol (message transport and parsing)
    Protocol,
    /// Service offered to other modules or agents
    Service,
}

/// Static description of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDesc {
    pub name: &'static str,
    pub kind: ModuleType,
    pub api_count: usize,
    pub event_count: usize,
    pub notification_count: usize,
}

/// Lifecycle state of a module or element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ModuleState {
    #[default]
    Uninitialized,
    Initialized,
    Bound,
    Started,
    /// Stopped during teardown.
    Suspended,
}

/// Element description.
#[derive(Debug, Clone, Copy)]
pub struct Element {
    pub name: &'static str,
    pub sub_element_count: usize,
    /// Element-specific configuration. Every element carries some.
    pub data: ConfigData,
}

/// Where a module's elements come from.
#[derive(Clone, Copy, Default)]
pub enum ElementTable {
    /// The module has no elements.
    #[default]
    None,
    Static(&'static [Element]),
    /// Built at startup from the module id. `None` is a configuration error.
    Generator(fn(Id) -> Option<&'static [Element]>),
}

/// Per-image module configuration.
#[derive(Clone, Copy, Default)]
pub struct ModuleConfig {
    pub data: Option<ConfigData>,
    pub elements: ElementTable,
}

impl ModuleConfig {
    pub const fn new() -> Self {
        Self { data: None, elements: ElementTable::None }
    }

    pub const fn with_data(mut self, data: ConfigData) -> Self {
        self.data = Some(data);
        self
    }

    pub const fn with_elements(mut self, elements: &'static [Element]) -> Self {
        self.elements = ElementTable::Static(elements);
        self
    }

    pub const fn with_generator(mut self, generator: fn(Id) -> Option<&'static [Element]>) -> Self {
        self.elements = ElementTable::Generator(generator);
        self
    }
}

/// One slot of the module table.
pub struct ModuleEntry {
    pub handler: Box<dyn Module>,
    pub config: ModuleConfig,
}

impl ModuleEntry {
    pub fn new(handler: Box<dyn Module>, config: ModuleConfig) -> Self {
        Self { handler, config }
    }
}

/// Module handler.
///
/// Only [`Module::desc`] and [`Module::init`] are mandatory. A module with
/// elements must also implement [`Module::element_init`]; a module that
/// declares APIs must implement [`Module::process_bind_request`].
///
/// `id` arguments name the module itself or one of its elements, depending
/// on which entity the call is for.
pub trait Module {
    fn desc(&self) -> ModuleDesc;

    fn init(
        &mut self,
        fwk: &mut Framework,
        module_id: Id,
        element_count: usize,
        data: Option<ConfigData>,
    ) -> FwkResult<()>;

    fn element_init(
        &mut self,
        _fwk: &mut Framework,
        _element_id: Id,
        _sub_element_count: usize,
        _data: ConfigData,
    ) -> FwkResult<()> {
        Err(FwkError::Support)
    }

    /// Runs once the module and all its elements are initialized.
    fn post_init(&mut self, _fwk: &mut Framework, _module_id: Id) -> FwkResult<()> {
        Ok(())
    }

    /// Called for the module and then each element, once per bind round.
    fn bind(&mut self, _fwk: &mut Framework, _id: Id, _round: u32) -> FwkResult<()> {
        Ok(())
    }

    fn start(&mut self, _fwk: &mut Framework, _id: Id) -> FwkResult<()> {
        Ok(())
    }

    fn stop(&mut self, _fwk: &mut Framework, _id: Id) -> FwkResult<()> {
        Ok(())
    }

    /// Hands out API `api_id` of `target_id` to `requester_id`.
    fn process_bind_request(
        &self,
        _requester_id: Id,
        _target_id: Id,
        _api_id: Id,
    ) -> FwkResult<ApiRef> {
        Err(FwkError::Support)
    }

    /// Handles an event addressed to this module or one of its elements.
    ///
    /// `response` is pre-filled from `event` with the endpoints swapped. It
    /// is sent when the event asked for a response and the handler returns
    /// [`Progress::Done`]; [`Progress::Pending`] parks it until the module
    /// submits the delayed response.
    fn process_event(
        &mut self,
        _fwk: &mut Framework,
        _event: &Event,
        _response: &mut Event,
    ) -> FwkResult<Progress> {
        Err(FwkError::Support)
    }

    /// Handles a notification this module subscribed to, or the response to
    /// one it sent.
    fn process_notification(
        &mut self,
        _fwk: &mut Framework,
        _event: &Event,
        _response: &mut Event,
    ) -> FwkResult<Progress> {
        Err(FwkError::Support)
    }
}
