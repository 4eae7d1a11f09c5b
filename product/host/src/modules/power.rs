//! Power domains
//!
//! Each element is a power domain. State changes take effect on the next
//! timer tick: requests are answered with a delayed response once the
//! domain reached the requested state, and every subscriber of the
//! domain's `state changed` notification is told about it.

use log::{debug, info, warn};

use fwk::{
    ConfigData, Event, FwkError, FwkResult, Framework, Id, IdType, Module, ModuleDesc,
    ModuleType, Progress,
};

use super::timer::{self, TimerApi};

pub const MODULE: Id = Id::module(super::POWER_IDX);
/// Request a state change. Parameter: target state as `u32`.
pub const EVENT_SET_STATE: Id = Id::event(super::POWER_IDX, 0);
/// Raised by a domain after its state changed. Parameter: new state.
pub const NOTIFICATION_STATE_CHANGED: Id = Id::notification(super::POWER_IDX, 0);

pub const STATE_OFF: u32 = 0;
pub const STATE_ON: u32 = 1;

/// Per-domain configuration.
pub struct DomainConfig {
    pub initial_state: u32,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    cookie: u32,
    state: u32,
}

#[derive(Default)]
pub struct Power {
    /// Current state per domain, allocated from the framework heap.
    states: &'static mut [u32],
    transitions: Vec<Option<Transition>>,
    timer: Option<&'static TimerApi>,
}

impl Power {
    fn complete(&mut self, fwk: &mut Framework, domain: usize) -> FwkResult<()> {
        let Some(transition) = self.transitions[domain].take() else {
            return Ok(());
        };
        let domain_id = Id::element(super::POWER_IDX, domain);
        self.states[domain] = transition.state;

        let mut response = Event::new(EVENT_SET_STATE, domain_id, Id::INVALID);
        response.cookie = transition.cookie;
        response.set_delayed_response();
        response.write_params(&transition.state)?;
        fwk.put_event(&mut response)?;

        let mut changed = Event::notification(NOTIFICATION_STATE_CHANGED, domain_id);
        changed.write_params(&transition.state)?;
        let count = fwk.notify(&mut changed)?;

        let tick = self.timer.map_or(0, |api| (api.ticks)());
        info!(
            "[POWER] {} -> {} at tick {}, {} subscribers notified",
            fwk.id_verbose(domain_id),
            transition.state,
            tick,
            count
        );
        Ok(())
    }
}

impl Module for Power {
    fn desc(&self) -> ModuleDesc {
        ModuleDesc {
            name: "power",
            kind: ModuleType::Hal,
            api_count: 0,
            event_count: 1,
            notification_count: 1,
        }
    }

    fn init(
        &mut self,
        fwk: &mut Framework,
        _module_id: Id,
        element_count: usize,
        _data: Option<ConfigData>,
    ) -> FwkResult<()> {
        if element_count == 0 {
            return Err(FwkError::Data);
        }
        self.states = fwk.mm()?.calloc_slice::<u32>(element_count)?;
        self.transitions = vec![None; element_count];
        Ok(())
    }

    fn element_init(
        &mut self,
        _fwk: &mut Framework,
        element_id: Id,
        _sub_element_count: usize,
        data: ConfigData,
    ) -> FwkResult<()> {
        let config = data.downcast_ref::<DomainConfig>().ok_or(FwkError::Data)?;
        self.states[element_id.element_idx()] = config.initial_state;
        Ok(())
    }

    fn bind(&mut self, fwk: &mut Framework, id: Id, round: u32) -> FwkResult<()> {
        if round == 0 && id == MODULE {
            self.timer = Some(fwk.bind_api::<TimerApi>(timer::MODULE, timer::API)?);
        }
        Ok(())
    }

    fn start(&mut self, fwk: &mut Framework, id: Id) -> FwkResult<()> {
        if id == MODULE {
            fwk.subscribe(timer::NOTIFICATION_TICK, timer::MODULE, MODULE)?;
        }
        Ok(())
    }

    fn process_event(&mut self, _fwk: &mut Framework, event: &Event, response: &mut Event) -> FwkResult<Progress> {
        if event.id != EVENT_SET_STATE || !event.target_id.is_type(IdType::Element) {
            return Err(FwkError::Param);
        }
        let domain = event.target_id.element_idx();
        let state: u32 = event.read_params()?;

        if self.states[domain] == state {
            response.write_params(&state)?;
            return Ok(Progress::Done);
        }
        if self.transitions[domain].is_some() {
            warn!("[POWER] domain {} busy", domain);
            return Err(FwkError::Busy);
        }
        if !event.response_requested() {
            self.states[domain] = state;
            return Ok(Progress::Done);
        }

        debug!("[POWER] domain {} -> {} deferred, cookie {}", domain, state, event.cookie);
        self.transitions[domain] = Some(Transition { cookie: event.cookie, state });
        Ok(Progress::Pending)
    }

    fn process_notification(
        &mut self,
        fwk: &mut Framework,
        event: &Event,
        _response: &mut Event,
    ) -> FwkResult<Progress> {
        if event.id != timer::NOTIFICATION_TICK {
            return Err(FwkError::Param);
        }
        for domain in 0..self.transitions.len() {
            self.complete(fwk, domain)?;
        }
        Ok(Progress::Done)
    }
}
