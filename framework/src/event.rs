//! Events
//!
//! An [`Event`] is a fixed-size message between two entities. Requests are
//! addressed to the module that owns the event id; responses travel back
//! from it. Parameters are carried inline and read or written as
//! plain-old-data types through `zerocopy`.

use zerocopy::{AsBytes, FromBytes};

use crate::id::Id;
use crate::status::{FwkError, FwkResult};

/// Size in bytes of the inline parameter payload.
pub const EVENT_PARAMETERS_SIZE: usize = 16;

bitflags::bitflags! {
    /// Event attribute bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventFlags: u8 {
        /// The event answers an earlier request.
        const RESPONSE           = 1 << 0;
        /// The sender wants a response.
        const RESPONSE_REQUESTED = 1 << 1;
        /// The event is a notification (or a response to one).
        const NOTIFICATION       = 1 << 2;
        /// The event completes a response that was left pending.
        const DELAYED_RESPONSE   = 1 << 3;
    }
}

/// Result of a handler that may finish its work later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Work is complete; any requested response can be sent now.
    Done,
    /// The response will be submitted later as a delayed response.
    Pending,
}

/// Framework event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Event {
    /// Sender entity.
    pub source_id: Id,
    /// Receiver entity.
    pub target_id: Id,
    /// Event or notification id.
    pub id: Id,
    /// Correlates a response with its request. Assigned when queued.
    pub cookie: u32,
    pub flags: EventFlags,
    pub params: [u8; EVENT_PARAMETERS_SIZE],
}

impl Event {
    /// Request `id` from `source_id` to `target_id`, with empty parameters.
    pub const fn new(id: Id, source_id: Id, target_id: Id) -> Self {
        Self {
            source_id,
            target_id,
            id,
            cookie: 0,
            flags: EventFlags::empty(),
            params: [0; EVENT_PARAMETERS_SIZE],
        }
    }

    /// Notification `id` from `source_id`. Targets are filled in per
    /// subscriber.
    pub const fn notification(id: Id, source_id: Id) -> Self {
        let mut event = Self::new(id, source_id, Id::INVALID);
        event.flags = EventFlags::NOTIFICATION;
        event
    }

    pub fn with_response_requested(mut self) -> Self {
        self.flags.insert(EventFlags::RESPONSE_REQUESTED);
        self
    }

    pub fn is_response(&self) -> bool {
        self.flags.contains(EventFlags::RESPONSE)
    }

    pub fn response_requested(&self) -> bool {
        self.flags.contains(EventFlags::RESPONSE_REQUESTED)
    }

    pub fn is_notification(&self) -> bool {
        self.flags.contains(EventFlags::NOTIFICATION)
    }

    pub fn is_delayed_response(&self) -> bool {
        self.flags.contains(EventFlags::DELAYED_RESPONSE)
    }

    /// Marks a response built by the handler as the completion of a
    /// pending request.
    pub fn set_delayed_response(&mut self) {
        self.flags.insert(EventFlags::RESPONSE | EventFlags::DELAYED_RESPONSE);
    }

    /// Builds the response skeleton for this request: endpoints swapped,
    /// same id, cookie and parameters.
    pub(crate) fn response_template(&self) -> Self {
        let mut flags = EventFlags::RESPONSE;
        flags.set(EventFlags::NOTIFICATION, self.is_notification());
        Self {
            source_id: self.target_id,
            target_id: self.source_id,
            id: self.id,
            cookie: self.cookie,
            flags,
            params: self.params,
        }
    }

    /// Writes `value` at the start of the parameter payload.
    ///
    /// Returns `Size` if the value does not fit.
    pub fn write_params<T: AsBytes>(&mut self, value: &T) -> FwkResult<()> {
        value.write_to_prefix(&mut self.params[..]).ok_or(FwkError::Size)
    }

    /// Reads a `T` from the start of the parameter payload.
    ///
    /// Returns `Size` if `T` is larger than the payload.
    pub fn read_params<T: FromBytes>(&self) -> FwkResult<T> {
        T::read_from_prefix(&self.params[..]).ok_or(FwkError::Size)
    }
}

/// Event without a payload, for callers that only signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightEvent {
    pub id: Id,
    pub source_id: Id,
    pub target_id: Id,
    pub response_requested: bool,
}

impl From<LightEvent> for Event {
    fn from(light: LightEvent) -> Self {
        let mut event = Event::new(light.id, light.source_id, light.target_id);
        event.flags.set(EventFlags::RESPONSE_REQUESTED, light.response_requested);
        event
    }
}
