//! Notifications
//!
//! A notification is a one-to-many event. Entities subscribe to a
//! notification raised by a particular source entity; [`Framework::notify`]
//! queues one copy of the notification per subscriber.
//!
//! Subscription lists exist per (source entity, notification index) and
//! draw their nodes from one pool sized at startup. Subscribing becomes
//! possible once every module is bound.

use alloc::vec::Vec;

use log::{debug, error};

use crate::event::{Event, EventFlags};
use crate::framework::Framework;
use crate::id::Id;
use crate::list::{Arena, List};
use crate::module::Topology;
use crate::status::{FwkError, FwkResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Subscription {
    source_id: Id,
    target_id: Id,
}

pub(crate) struct Subscriptions {
    arena: Arena<Subscription>,
    free: List,
    /// Indexed by entity slot, then notification index.
    tables: Vec<Vec<List>>,
}

impl Subscriptions {
    pub fn new(capacity: usize, topology: &Topology) -> Self {
        let mut arena = Arena::with_capacity(capacity);
        let mut free = List::new();
        for _ in 0..capacity {
            let node = arena.insert(Subscription::default());
            arena.push_tail(&mut free, node);
        }

        let mut tables = Vec::with_capacity(topology.slot_count());
        for shape in topology.shapes() {
            for _ in 0..=shape.element_count() {
                tables.push(alloc::vec![List::new(); shape.notification_count]);
            }
        }
        Self { arena, free, tables }
    }

    fn list_mut(&mut self, topology: &Topology, notification_id: Id, source_id: Id) -> Option<&mut List> {
        let slot = topology.entity_slot(source_id)?;
        self.tables.get_mut(slot)?.get_mut(notification_id.notification_idx())
    }

    fn find(&self, list: &List, source_id: Id, target_id: Id) -> Option<crate::list::NodeId> {
        self.arena.find(list, |s| s.source_id == source_id && s.target_id == target_id)
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl Framework {
    fn check_subscription(&self, notification_id: Id, source_id: Id, target_id: Id) -> FwkResult<()> {
        if self.subscriptions.is_none() {
            return Err(FwkError::Init);
        }
        if self.interrupt.get_current().is_ok() {
            return Err(FwkError::Handler);
        }
        if !self.topology.is_valid_notification_id(notification_id)
            || !self.topology.is_valid_entity_id(source_id)
            || !self.topology.is_valid_entity_id(target_id)
            || notification_id.module_idx() != source_id.module_idx()
        {
            return Err(FwkError::Param);
        }
        Ok(())
    }

    /// Subscribes `target_id` to `notification_id` raised by `source_id`.
    ///
    /// `Init` before the start stage, `Handler` from interrupt context,
    /// `Param` for invalid ids or a source outside the notification's
    /// module, `State` if the subscription exists and `NoMem` when the
    /// subscription pool is exhausted.
    pub fn subscribe(&mut self, notification_id: Id, source_id: Id, target_id: Id) -> FwkResult<()> {
        let result = self.subscribe_inner(notification_id, source_id, target_id);
        if let Err(e) = result {
            error!("[NOT] subscribe {} {} -> {}: {}", notification_id, source_id, target_id, e);
        }
        result
    }

    fn subscribe_inner(&mut self, notification_id: Id, source_id: Id, target_id: Id) -> FwkResult<()> {
        self.check_subscription(notification_id, source_id, target_id)?;
        let subs = self.subscriptions.as_mut().ok_or(FwkError::Init)?;

        let mut list = *subs
            .list_mut(&self.topology, notification_id, source_id)
            .ok_or(FwkError::Param)?;
        if subs.find(&list, source_id, target_id).is_some() {
            return Err(FwkError::State);
        }
        let node = subs.arena.pop_head(&mut subs.free).ok_or(FwkError::NoMem)?;
        *subs.arena.get_mut(node) = Subscription { source_id, target_id };
        subs.arena.push_tail(&mut list, node);
        if let Some(slot) = subs.list_mut(&self.topology, notification_id, source_id) {
            *slot = list;
        }

        debug!("[NOT] {} subscribed to {} @ {}", target_id, notification_id, source_id);
        Ok(())
    }

    /// Removes a subscription. `State` if it does not exist; other errors
    /// as for [`Framework::subscribe`].
    pub fn unsubscribe(&mut self, notification_id: Id, source_id: Id, target_id: Id) -> FwkResult<()> {
        let result = self.unsubscribe_inner(notification_id, source_id, target_id);
        if let Err(e) = result {
            error!("[NOT] unsubscribe {} {} -> {}: {}", notification_id, source_id, target_id, e);
        }
        result
    }

    fn unsubscribe_inner(&mut self, notification_id: Id, source_id: Id, target_id: Id) -> FwkResult<()> {
        self.check_subscription(notification_id, source_id, target_id)?;
        let subs = self.subscriptions.as_mut().ok_or(FwkError::Init)?;

        let mut list = *subs
            .list_mut(&self.topology, notification_id, source_id)
            .ok_or(FwkError::Param)?;
        let node = subs.find(&list, source_id, target_id).ok_or(FwkError::State)?;
        subs.arena.remove(&mut list, node);
        subs.arena.push_tail(&mut subs.free, node);
        if let Some(slot) = subs.list_mut(&self.topology, notification_id, source_id) {
            *slot = list;
        }

        debug!("[NOT] {} unsubscribed from {} @ {}", target_id, notification_id, source_id);
        Ok(())
    }

    /// Number of entities subscribed to `notification_id` from `source_id`.
    pub fn subscriber_count(&self, notification_id: Id, source_id: Id) -> FwkResult<usize> {
        let subs = self.subscriptions.as_ref().ok_or(FwkError::Init)?;
        if !self.topology.is_valid_notification_id(notification_id)
            || !self.topology.is_valid_entity_id(source_id)
            || notification_id.module_idx() != source_id.module_idx()
        {
            return Err(FwkError::Param);
        }
        let slot = self.topology.entity_slot(source_id).ok_or(FwkError::Param)?;
        subs.tables
            .get(slot)
            .and_then(|t| t.get(notification_id.notification_idx()))
            .map(List::len)
            .ok_or(FwkError::Param)
    }

    /// Queues one copy of `event` per subscriber and returns how many were
    /// queued.
    ///
    /// From thread context while an event is processed, an invalid source
    /// is replaced by the current event's target; from interrupt context the
    /// source must be valid. The event's flags are normalised to a
    /// notification request; `RESPONSE_REQUESTED` is kept, so every
    /// subscriber answers with a response to the source. The cookie of the
    /// last queued copy is written back into `event`.
    pub fn notify(&mut self, event: &mut Event) -> FwkResult<usize> {
        let result = self.notify_inner(event);
        if let Err(e) = result {
            error!("[NOT] notify {} @ {}: {}", event.id, event.source_id, e);
        }
        result
    }

    fn notify_inner(&mut self, event: &mut Event) -> FwkResult<usize> {
        let subs = self.subscriptions.as_ref().ok_or(FwkError::Init)?;
        let from_isr = self.interrupt.is_interrupt_context();
        self.resolve_source(&mut event.source_id, from_isr)?;

        if !self.topology.is_valid_notification_id(event.id)
            || event.id.try_module_idx() != event.source_id.try_module_idx()
        {
            return Err(FwkError::Param);
        }

        let slot = self.topology.entity_slot(event.source_id).ok_or(FwkError::Param)?;
        let list = subs
            .tables
            .get(slot)
            .and_then(|t| t.get(event.id.notification_idx()))
            .ok_or(FwkError::Param)?;
        let targets: Vec<Id> = subs
            .arena
            .iter(list)
            .filter(|(_, s)| s.source_id == event.source_id)
            .map(|(_, s)| s.target_id)
            .collect();

        event.flags.remove(EventFlags::RESPONSE | EventFlags::DELAYED_RESPONSE);
        event.flags.insert(EventFlags::NOTIFICATION);

        let mut count = 0;
        for target_id in targets {
            let mut copy = *event;
            copy.target_id = target_id;
            if self.queue_event(&mut copy, from_isr).is_ok() {
                event.cookie = copy.cookie;
                count += 1;
            }
        }

        debug!("[NOT] {} @ {} sent to {} subscribers", event.id, event.source_id, count);
        Ok(count)
    }

    /// Unused subscription slots.
    pub fn free_subscription_count(&self) -> usize {
        self.subscriptions.as_ref().map_or(0, Subscriptions::free_count)
    }
}
