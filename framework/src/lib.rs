//! SCP firmware framework
//!
//! Structures System Control Processor firmware as a set of statically
//! registered modules that talk to each other through events and
//! notifications. The framework provides:
//!
//! - [`id`]: 32-bit entity identifiers for modules, elements, sub-elements,
//!   APIs, events and notifications
//! - [`module`]: the module registry and the init/bind/start lifecycle
//! - [`dispatch`]: the single-consumer event queues and dispatch loop, with
//!   delayed responses
//! - [`notification`]: one-to-many notifications with subscriber counting
//! - [`interrupt`] and [`arch`]: the architecture seam and boot sequence
//!
//! Everything lives in one [`Framework`] context object; module handlers
//! receive it by mutable reference while they run.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod arch;
pub mod dispatch;
pub mod event;
pub mod framework;
pub mod id;
pub mod interrupt;
pub mod list;
pub mod logging;
pub mod mm;
pub mod module;
#[cfg(feature = "notification")]
pub mod notification;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::IsrEventSender;
pub use event::{Event, EventFlags, LightEvent, Progress, EVENT_PARAMETERS_SIZE};
pub use framework::{Config, Framework, Stage};
pub use id::{Id, IdKind, IdType};
pub use interrupt::InterruptDriver;
pub use module::{
    ApiRef, ConfigData, Element, ElementTable, Module, ModuleConfig, ModuleDesc, ModuleEntry,
    ModuleState, ModuleType,
};
pub use status::{FwkError, FwkResult};
