//! System timer
//!
//! Turns the periodic timer interrupt into a `tick` event and broadcasts
//! it to subscribers as a notification.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace};

use fwk::{
    ApiRef, ConfigData, Event, FwkError, FwkResult, Framework, Id, IsrEventSender, Module,
    ModuleDesc, ModuleType, Progress,
};

pub const MODULE: Id = Id::module(super::TIMER_IDX);
pub const EVENT_TICK: Id = Id::event(super::TIMER_IDX, 0);
pub const NOTIFICATION_TICK: Id = Id::notification(super::TIMER_IDX, 0);
pub const API: Id = Id::api(super::TIMER_IDX, 0);

/// Interrupt line of the timer.
pub const IRQ: u32 = 2;

pub struct TimerApi {
    /// Ticks processed so far.
    pub ticks: fn() -> usize,
}

static TICKS: AtomicUsize = AtomicUsize::new(0);
static SENDER: spin::Once<IsrEventSender> = spin::Once::new();
static API_IMPL: TimerApi = TimerApi { ticks: ticks };

fn ticks() -> usize {
    TICKS.load(Ordering::Acquire)
}

fn isr() {
    if let Some(sender) = SENDER.get() {
        let mut tick = Event::new(EVENT_TICK, MODULE, MODULE);
        if sender.put_event(&mut tick).is_err() {
            trace!("[TIMER] tick dropped");
        }
    }
}

pub struct Timer;

impl Module for Timer {
    fn desc(&self) -> ModuleDesc {
        ModuleDesc {
            name: "timer",
            kind: ModuleType::Driver,
            api_count: 1,
            event_count: 1,
            notification_count: 1,
        }
    }

    fn init(
        &mut self,
        _fwk: &mut Framework,
        _module_id: Id,
        element_count: usize,
        _data: Option<ConfigData>,
    ) -> FwkResult<()> {
        if element_count != 0 {
            return Err(FwkError::Data);
        }
        Ok(())
    }

    fn start(&mut self, fwk: &mut Framework, _id: Id) -> FwkResult<()> {
        let sender = fwk.isr_sender()?;
        SENDER.call_once(|| sender);
        fwk.interrupt().set_isr_irq(IRQ, isr)?;
        fwk.interrupt().enable(IRQ)
    }

    fn stop(&mut self, fwk: &mut Framework, _id: Id) -> FwkResult<()> {
        fwk.interrupt().disable(IRQ)
    }

    fn process_bind_request(&self, _requester_id: Id, _target_id: Id, api_id: Id) -> FwkResult<ApiRef> {
        if api_id != API {
            return Err(FwkError::Param);
        }
        Ok(&API_IMPL)
    }

    fn process_event(&mut self, fwk: &mut Framework, event: &Event, _response: &mut Event) -> FwkResult<Progress> {
        if event.id != EVENT_TICK {
            return Err(FwkError::Param);
        }
        let count = TICKS.fetch_add(1, Ordering::AcqRel) + 1;
        let mut tick = Event::notification(NOTIFICATION_TICK, Id::INVALID);
        tick.write_params(&(count as u32))?;
        let subscribers = fwk.notify(&mut tick)?;
        debug!("[TIMER] tick {} to {} subscribers", count, subscribers);
        Ok(Progress::Done)
    }
}
