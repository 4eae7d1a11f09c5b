//! Event queues and dispatch
//!
//! All events live in one fixed pool allocated at startup. Free slots, the
//! interrupt queue, the thread queue and the per-entity delayed-response
//! lists are lists over that pool. Interrupt handlers only append to the
//! interrupt queue; everything else happens on the thread running the
//! dispatch loop. The pool is only ever locked with interrupts masked.
//!
//! The loop always takes the oldest interrupt event before any thread
//! event, so a steady stream of interrupt events starves thread events.

use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, error};
use spin::Mutex;

use crate::arch::Arch;
use crate::event::{Event, EventFlags, LightEvent, Progress};
use crate::framework::Framework;
use crate::id::Id;
use crate::interrupt::Interrupt;
use crate::list::{Arena, List};
use crate::logging;
use crate::module::Topology;
use crate::status::{FwkError, FwkResult};

/// Event pool shared with interrupt handlers.
pub(crate) struct EventQueues {
    arena: Arena<Event>,
    free: List,
    isr: List,
    thread: List,
    /// Parked responses, one list per entity slot.
    delayed: Vec<List>,
    next_cookie: u32,
}

impl EventQueues {
    pub fn new(capacity: usize, slot_count: usize) -> Self {
        let mut arena = Arena::with_capacity(capacity);
        let mut free = List::new();
        for _ in 0..capacity {
            let node = arena.insert(Event::default());
            arena.push_tail(&mut free, node);
        }
        Self {
            arena,
            free,
            isr: List::new(),
            thread: List::new(),
            delayed: alloc::vec![List::new(); slot_count],
            next_cookie: 1,
        }
    }

    fn next_cookie(&mut self) -> u32 {
        let cookie = self.next_cookie;
        self.next_cookie = self.next_cookie.wrapping_add(1);
        cookie
    }

    /// Copies `event` into a free slot and appends it to a queue.
    fn enqueue(&mut self, event: &Event, from_isr: bool) -> FwkResult<()> {
        let node = self.arena.pop_head(&mut self.free).ok_or(FwkError::NoMem)?;
        *self.arena.get_mut(node) = *event;
        let queue = if from_isr { &mut self.isr } else { &mut self.thread };
        self.arena.push_tail(queue, node);
        Ok(())
    }

    /// Oldest interrupt event, else oldest thread event.
    fn pop_next(&mut self) -> Option<Event> {
        let node = match self.arena.pop_head(&mut self.isr) {
            Some(node) => node,
            None => self.arena.pop_head(&mut self.thread)?,
        };
        let event = *self.arena.get(node);
        self.arena.push_tail(&mut self.free, node);
        Some(event)
    }

    fn is_idle(&self) -> bool {
        self.isr.is_empty() && self.thread.is_empty()
    }

    fn free_count(&self) -> usize {
        self.free.len()
    }

    fn find_delayed(&self, slot: usize, cookie: u32) -> Option<Event> {
        let list = self.delayed.get(slot)?;
        let node = self.arena.find(list, |e| e.cookie == cookie)?;
        Some(*self.arena.get(node))
    }

    /// Parks a response. At most one response per cookie and entity.
    fn park(&mut self, slot: usize, response: &Event) -> FwkResult<()> {
        if self.find_delayed(slot, response.cookie).is_some() {
            return Err(FwkError::State);
        }
        let list = self.delayed.get_mut(slot).ok_or(FwkError::Param)?;
        let node = self.arena.pop_head(&mut self.free).ok_or(FwkError::NoMem)?;
        *self.arena.get_mut(node) = *response;
        self.arena.push_tail(list, node);
        Ok(())
    }

    /// Removes a parked response and returns its slot to the pool.
    fn take_delayed(&mut self, slot: usize, cookie: u32) -> Option<Event> {
        let list = self.delayed.get_mut(slot)?;
        let node = self.arena.find(list, |e| e.cookie == cookie)?;
        self.arena.remove(list, node);
        let event = *self.arena.get(node);
        self.arena.push_tail(&mut self.free, node);
        Some(event)
    }

    fn first_delayed(&self, slot: usize) -> Option<Event> {
        let node = self.delayed.get(slot)?.head()?;
        Some(*self.arena.get(node))
    }
}

/// Checks the id, endpoints and flags of an event about to be queued. The
/// source must already be resolved.
pub(crate) fn validate(topology: &Topology, event: &Event) -> FwkResult<()> {
    let id_module = event.id.try_module_idx();

    if event.is_notification() {
        // Only responses to notifications travel through put_event.
        if !topology.is_valid_notification_id(event.id)
            || !event.is_response()
            || event.response_requested()
            || event.target_id.try_module_idx() != id_module
        {
            return Err(FwkError::Param);
        }
    } else {
        if !topology.is_valid_event_id(event.id) {
            return Err(FwkError::Param);
        }
        if event.is_response() {
            if event.source_id.try_module_idx() != id_module || event.response_requested() {
                return Err(FwkError::Param);
            }
        } else if event.target_id.try_module_idx() != id_module {
            return Err(FwkError::Param);
        }
    }

    // A delayed response takes its target from the parked entry.
    if !event.is_delayed_response() && !topology.is_valid_entity_id(event.target_id) {
        return Err(FwkError::Param);
    }
    Ok(())
}

fn validate_light(topology: &Topology, event: &LightEvent) -> FwkResult<()> {
    if !topology.is_valid_event_id(event.id)
        || !topology.is_valid_entity_id(event.target_id)
        || event.target_id.try_module_idx() != event.id.try_module_idx()
    {
        return Err(FwkError::Param);
    }
    Ok(())
}

fn wake(arch: Option<&Arc<dyn Arch>>) -> FwkResult<()> {
    match arch {
        Some(arch) => arch.wake().map_err(|_| FwkError::Os),
        None => Ok(()),
    }
}

fn log_sent(event: &Event) {
    debug!(
        "[FWK] Sent {}: {} @ {} -> {}",
        event.cookie, event.id, event.source_id, event.target_id
    );
}

impl Framework {
    /// Runs `f` on the pool with interrupts masked. `Init` before startup.
    fn with_queues<R>(&self, f: impl FnOnce(&mut EventQueues) -> R) -> FwkResult<R> {
        let queues = self.queues.as_ref().ok_or(FwkError::Init)?;
        Ok(self.interrupt.critical(|| f(&mut *queues.lock())))
    }

    /// Resolves the source of an event submitted from thread context while
    /// a handler runs, and checks it otherwise.
    pub(crate) fn resolve_source(&self, source_id: &mut Id, from_isr: bool) -> FwkResult<()> {
        if self.topology.is_valid_entity_id(*source_id) {
            return Ok(());
        }
        match (&self.current_event, from_isr) {
            (Some(current), false) => {
                *source_id = current.target_id;
                Ok(())
            }
            _ => Err(FwkError::Param),
        }
    }

    /// Queues a copy of `event`.
    ///
    /// From thread context while an event is processed, an unset source is
    /// filled with the current event's target. Requests get a fresh cookie,
    /// written back into `event`; responses keep theirs. A delayed response
    /// completes the response parked under its source and cookie, carrying
    /// the parameters of `event`.
    ///
    /// `Init` before startup, `Param` for invalid events or an unknown
    /// delayed response, `NoMem` when the pool is exhausted and `Os` if the
    /// architecture cannot be woken.
    pub fn put_event(&mut self, event: &mut Event) -> FwkResult<()> {
        let result = self.put_event_inner(event);
        if let Err(e) = result {
            error!("[FWK] put_event {} @ {} -> {}: {}", event.id, event.source_id, event.target_id, e);
        }
        result
    }

    fn put_event_inner(&mut self, event: &mut Event) -> FwkResult<()> {
        if self.queues.is_none() {
            return Err(FwkError::Init);
        }
        let from_isr = self.interrupt.is_interrupt_context();
        self.resolve_source(&mut event.source_id, from_isr)?;
        validate(&self.topology, event)?;

        let slot = if event.is_delayed_response() {
            Some(self.topology.entity_slot(event.source_id).ok_or(FwkError::Param)?)
        } else {
            None
        };
        let sent = self.with_queues(|queues| -> FwkResult<Event> {
            match slot {
                Some(slot) => {
                    let mut parked = queues.take_delayed(slot, event.cookie).ok_or(FwkError::Param)?;
                    parked.params = event.params;
                    parked.flags.insert(EventFlags::DELAYED_RESPONSE);
                    queues.enqueue(&parked, from_isr)?;
                    Ok(parked)
                }
                None => {
                    if !event.is_response() {
                        event.cookie = queues.next_cookie();
                    }
                    queues.enqueue(event, from_isr)?;
                    Ok(*event)
                }
            }
        })??;

        log_sent(&sent);
        if from_isr {
            wake(self.arch.as_ref())?;
        }
        Ok(())
    }

    /// Queues a payload-less event. The event is promoted to a full
    /// [`Event`] with zeroed parameters and a fresh cookie.
    pub fn put_event_light(&mut self, event: &mut LightEvent) -> FwkResult<()> {
        let result = self.put_event_light_inner(event);
        if let Err(e) = result {
            error!("[FWK] put_event_light {} @ {} -> {}: {}", event.id, event.source_id, event.target_id, e);
        }
        result
    }

    fn put_event_light_inner(&mut self, event: &mut LightEvent) -> FwkResult<()> {
        if self.queues.is_none() {
            return Err(FwkError::Init);
        }
        let from_isr = self.interrupt.is_interrupt_context();
        self.resolve_source(&mut event.source_id, from_isr)?;
        validate_light(&self.topology, event)?;

        let mut full = Event::from(*event);
        self.with_queues(|queues| {
            full.cookie = queues.next_cookie();
            queues.enqueue(&full, from_isr)
        })??;

        log_sent(&full);
        if from_isr {
            wake(self.arch.as_ref())?;
        }
        Ok(())
    }

    /// Queues an already validated event, assigning a cookie to anything
    /// that is not a response.
    pub(crate) fn queue_event(&mut self, event: &mut Event, from_isr: bool) -> FwkResult<()> {
        self.with_queues(|queues| {
            if !event.is_response() {
                event.cookie = queues.next_cookie();
            }
            queues.enqueue(event, from_isr)
        })?
        .map_err(|e| {
            error!("[FWK] event pool exhausted");
            e
        })?;
        log_sent(event);
        if from_isr {
            wake(self.arch.as_ref())?;
        }
        Ok(())
    }

    /// Handle for queueing events from interrupt handlers. `Init` before
    /// startup.
    pub fn isr_sender(&self) -> FwkResult<IsrEventSender> {
        Ok(IsrEventSender {
            queues: self.queues.clone().ok_or(FwkError::Init)?,
            interrupt: self.interrupt.clone(),
            topology: self.topology.clone(),
            arch: self.arch.clone(),
        })
    }

    /// Dispatches queued events until both queues are empty.
    pub fn process_event_queue(&mut self) {
        while let Ok(Some(event)) = self.with_queues(EventQueues::pop_next) {
            self.dispatch(event);
        }
    }

    /// Whether both queues are empty.
    pub fn is_idle(&self) -> bool {
        self.with_queues(|q| q.is_idle()).unwrap_or(true)
    }

    /// Unused event slots.
    pub fn free_event_count(&self) -> usize {
        self.with_queues(|q| q.free_count()).unwrap_or(0)
    }

    fn dispatch(&mut self, event: Event) {
        debug!(
            "[FWK] Processing {}: {} @ {} -> {}",
            event.cookie, event.id, event.source_id, event.target_id
        );

        let Some(module_idx) = event.target_id.try_module_idx() else {
            error!("[FWK] dropping event with target {}", event.target_id);
            return;
        };

        self.current_event = Some(event);
        let mut response = event.response_template();
        let result = self.with_handler(module_idx, |module, fwk| {
            if event.is_notification() {
                module.process_notification(fwk, &event, &mut response)
            } else {
                module.process_event(fwk, &event, &mut response)
            }
        });
        self.current_event = None;

        if let Err(e) = result {
            error!(
                "[FWK] Process event ({}: {} -> {}) ({})",
                event.id, event.source_id, event.target_id, e
            );
        }

        if !event.response_requested() {
            return;
        }

        response.flags.remove(EventFlags::RESPONSE_REQUESTED);
        response.flags.insert(EventFlags::RESPONSE);
        if matches!(result, Ok(Progress::Pending)) {
            response.flags.remove(EventFlags::DELAYED_RESPONSE);
            if let Err(e) = self.park_response(&response) {
                error!("[FWK] cannot park response {} for {}: {}", response.cookie, response.source_id, e);
            }
        } else if let Err(e) = self.queue_event(&mut response, false) {
            error!("[FWK] response {} to {} lost: {}", response.cookie, response.target_id, e);
        }
    }

    fn park_response(&mut self, response: &Event) -> FwkResult<()> {
        let slot = self.topology.entity_slot(response.source_id).ok_or(FwkError::Param)?;
        self.with_queues(|q| q.park(slot, response))??;
        debug!("[FWK] Parked {}: {} @ {}", response.cookie, response.id, response.source_id);
        Ok(())
    }

    fn delayed_slot(&self, id: Id) -> FwkResult<usize> {
        if self.queues.is_none() {
            return Err(FwkError::Init);
        }
        if self.interrupt.is_interrupt_context() {
            return Err(FwkError::Access);
        }
        self.topology.entity_slot(id).ok_or(FwkError::Param)
    }

    /// Copy of the response parked by `id` under `cookie`.
    ///
    /// `Init` before startup, `Access` from interrupt context, `Param` for
    /// an unknown id or cookie.
    pub fn get_delayed_response(&self, id: Id, cookie: u32) -> FwkResult<Event> {
        let slot = self.delayed_slot(id)?;
        self.with_queues(|q| q.find_delayed(slot, cookie))?.ok_or(FwkError::Param)
    }

    pub fn is_delayed_response_list_empty(&self, id: Id) -> FwkResult<bool> {
        let slot = self.delayed_slot(id)?;
        Ok(self.with_queues(|q| q.first_delayed(slot))?.is_none())
    }

    /// Oldest response parked by `id`. `State` when there is none.
    pub fn get_first_delayed_response(&self, id: Id) -> FwkResult<Event> {
        let slot = self.delayed_slot(id)?;
        self.with_queues(|q| q.first_delayed(slot))?.ok_or(FwkError::State)
    }

    /// Event being processed, if a handler is running.
    pub fn current_event(&self) -> Option<&Event> {
        self.current_event.as_ref()
    }

    /// Flushes buffered log output, then suspends the architecture once
    /// nothing is left to print.
    fn idle(&self) {
        match logging::unbuffer() {
            Ok(Progress::Done) => {
                if let Some(arch) = &self.arch {
                    if self.is_idle() {
                        arch.suspend();
                    }
                }
            }
            Ok(Progress::Pending) => {}
            Err(e) => error!("[FWK] log output failed: {}", e),
        }
    }

    /// Runs the dispatch loop while `keep_running` holds.
    pub fn run_while<F>(&mut self, mut keep_running: F)
    where
        F: FnMut(&Framework) -> bool,
    {
        while keep_running(self) {
            self.process_event_queue();
            if !keep_running(self) {
                break;
            }
            self.idle();
        }
    }

    /// The dispatch loop.
    pub fn run(&mut self) -> ! {
        loop {
            self.process_event_queue();
            self.idle();
        }
    }
}

/// Queues events from interrupt handlers.
///
/// Events always go to the interrupt queue, and the architecture is woken
/// after each one. Sources must be valid entities and delayed responses
/// cannot be completed from here.
#[derive(Clone)]
pub struct IsrEventSender {
    queues: Arc<Mutex<EventQueues>>,
    interrupt: Arc<Interrupt>,
    topology: Arc<Topology>,
    arch: Option<Arc<dyn Arch>>,
}

impl IsrEventSender {
    fn with_queues<R>(&self, f: impl FnOnce(&mut EventQueues) -> R) -> R {
        self.interrupt.critical(|| f(&mut *self.queues.lock()))
    }

    pub fn put_event(&self, event: &mut Event) -> FwkResult<()> {
        if !self.topology.is_valid_entity_id(event.source_id) || event.is_delayed_response() {
            return Err(FwkError::Param);
        }
        validate(&self.topology, event)?;
        self.with_queues(|queues| {
            if !event.is_response() {
                event.cookie = queues.next_cookie();
            }
            queues.enqueue(event, true)
        })?;
        wake(self.arch.as_ref())
    }

    pub fn put_event_light(&self, event: &LightEvent) -> FwkResult<()> {
        if !self.topology.is_valid_entity_id(event.source_id) {
            return Err(FwkError::Param);
        }
        validate_light(&self.topology, event)?;
        self.with_queues(|queues| {
            let mut full = Event::from(*event);
            full.cookie = queues.next_cookie();
            queues.enqueue(&full, true)
        })?;
        wake(self.arch.as_ref())
    }
}
