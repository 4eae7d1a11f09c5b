//! Framework context
//!
//! [`Framework`] owns the module table, the event storage and the
//! notification tables. It is built once from the module list, started
//! (init, bind rounds, start) and then driven by the dispatch loop.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use log::{error, info};

use crate::arch::Arch;
use crate::dispatch::EventQueues;
use crate::event::Event;
use crate::id::{Id, IdKind};
use crate::interrupt::{Interrupt, InterruptDriver};
use crate::mm::BumpAllocator;
use crate::module::{
    ApiRef, ConfigData, Module, ModuleEntry, ModuleState, Registry, Topology, BIND_ROUND_COUNT,
};
#[cfg(feature = "notification")]
use crate::notification::Subscriptions;
use crate::status::{FwkError, FwkResult};

/// Smallest event and subscription pool.
pub const MIN_POOL_SIZE: usize = 16;

/// Startup progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Module table resolved, storage not yet allocated.
    Created,
    Initialize,
    Bind,
    Start,
    /// Startup completed; the dispatch loop may run.
    Runtime,
    /// Modules stopped by teardown.
    Stopped,
}

/// Runtime configuration.
#[derive(Debug, Default)]
pub struct Config {
    /// Event pool size. Computed from the module table when `None`.
    pub event_count: Option<usize>,
    /// Subscription pool size. Computed from the module table when `None`.
    pub subscription_count: Option<usize>,
    /// Region backing [`Framework::mm`].
    pub heap: Option<&'static mut [u8]>,
}

pub struct Framework {
    pub(crate) registry: Registry,
    pub(crate) topology: Arc<Topology>,
    stage: Stage,
    /// Entity on whose behalf the current lifecycle call runs.
    bind_id: Id,
    event_capacity: usize,
    subscription_capacity: usize,
    pub(crate) queues: Option<Arc<spin::Mutex<EventQueues>>>,
    pub(crate) current_event: Option<Event>,
    #[cfg(feature = "notification")]
    pub(crate) subscriptions: Option<Subscriptions>,
    pub(crate) interrupt: Arc<Interrupt>,
    pub(crate) arch: Option<Arc<dyn Arch>>,
    mm: Option<BumpAllocator>,
}

impl Framework {
    /// Resolves the module table and sizes the storage pools.
    pub fn new(modules: Vec<ModuleEntry>, config: Config) -> FwkResult<Self> {
        let (registry, topology) = Registry::build(modules)?;

        let event_capacity = config.event_count.unwrap_or_else(|| {
            registry
                .entity_weighted_sum(|d| d.event_count + d.notification_count)
                .max(MIN_POOL_SIZE)
        });
        let subscription_capacity = config.subscription_count.unwrap_or_else(|| {
            registry.entity_weighted_sum(|d| d.notification_count).max(MIN_POOL_SIZE)
        });
        if event_capacity == 0 {
            error!("[FWK] event pool cannot be empty");
            return Err(FwkError::Param);
        }

        Ok(Self {
            registry,
            topology: Arc::new(topology),
            stage: Stage::Created,
            bind_id: Id::NONE,
            event_capacity,
            subscription_capacity,
            queues: None,
            current_event: None,
            #[cfg(feature = "notification")]
            subscriptions: None,
            interrupt: Arc::new(Interrupt::new()),
            arch: None,
            mm: config.heap.map(BumpAllocator::new),
        })
    }

    pub(crate) fn set_arch(&mut self, arch: Arc<dyn Arch>) {
        self.arch = Some(arch);
    }

    /// Registers the interrupt driver used to classify callers and to
    /// back [`Framework::interrupt`].
    pub fn register_interrupt_driver(&mut self, driver: Arc<dyn InterruptDriver>) -> FwkResult<()> {
        self.interrupt.init(driver)
    }

    /// Interrupt façade.
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Handle on the same façade, for code outside the framework that
    /// shares data with interrupt handlers.
    pub(crate) fn interrupt_handle(&self) -> Arc<Interrupt> {
        self.interrupt.clone()
    }

    pub fn is_interrupt_context(&self) -> bool {
        self.interrupt.is_interrupt_context()
    }

    /// Allocator over the region given in [`Config::heap`]. `Init` when no
    /// region was provided.
    pub fn mm(&mut self) -> FwkResult<&mut BumpAllocator> {
        self.mm.as_mut().ok_or(FwkError::Init)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    pub fn subscription_capacity(&self) -> usize {
        self.subscription_capacity
    }

    /// Allocates event storage, then initializes, binds and starts every
    /// module in table order. The first failure aborts startup.
    pub fn start(&mut self) -> FwkResult<()> {
        if self.stage != Stage::Created {
            error!("[MOD] framework already started");
            return Err(FwkError::State);
        }

        self.queues = Some(Arc::new(spin::Mutex::new(EventQueues::new(
            self.event_capacity,
            self.topology.slot_count(),
        ))));

        self.stage = Stage::Initialize;
        for idx in 0..self.registry.len() {
            self.init_module(idx)?;
        }

        self.stage = Stage::Bind;
        for round in 0..BIND_ROUND_COUNT {
            for idx in 0..self.registry.len() {
                self.bind_module(idx, round)?;
            }
        }

        #[cfg(feature = "notification")]
        {
            self.subscriptions =
                Some(Subscriptions::new(self.subscription_capacity, &self.topology));
        }

        self.stage = Stage::Start;
        for idx in 0..self.registry.len() {
            self.start_module(idx)?;
        }

        self.stage = Stage::Runtime;
        self.bind_id = Id::NONE;
        info!("[FWK] {} modules started", self.registry.len());
        Ok(())
    }

    /// Stops every element and module, last module first.
    ///
    /// Errors are logged; the first one is returned after all modules had
    /// the chance to stop.
    pub fn stop(&mut self) -> FwkResult<()> {
        if self.stage != Stage::Runtime {
            return Err(FwkError::State);
        }

        let mut first_error = None;
        for idx in (0..self.registry.len()).rev() {
            let element_count = self.registry.get(idx).map_or(0, |ctx| ctx.elements.len());
            let ids = (0..element_count).rev().map(|e| Id::element(idx, e)).chain([Id::module(idx)]);
            for id in ids {
                match self.with_handler(idx, |m, fwk| m.stop(fwk, id)) {
                    Ok(()) => self.registry.set_state(id, ModuleState::Suspended),
                    Err(e) => {
                        error!("[MOD] stop {} failed: {}", id, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        self.stage = Stage::Stopped;
        info!("[FWK] modules stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Runs `f` with the handler of module `module_idx` taken out of the
    /// table. `State` if the handler is already running.
    pub(crate) fn with_handler<R, F>(&mut self, module_idx: usize, f: F) -> FwkResult<R>
    where
        F: FnOnce(&mut dyn Module, &mut Framework) -> FwkResult<R>,
    {
        let mut handler: Box<dyn Module> =
            self.registry.take_handler(module_idx).ok_or(FwkError::State)?;
        let result = f(handler.as_mut(), self);
        self.registry.restore_handler(module_idx, handler);
        result
    }

    fn init_module(&mut self, idx: usize) -> FwkResult<()> {
        let module_id = Id::module(idx);
        let (data, elements) = match self.registry.get(idx) {
            Some(ctx) => (ctx.data, ctx.elements),
            None => return Err(FwkError::Param),
        };

        self.bind_id = module_id;
        self.with_handler(idx, |m, fwk| m.init(fwk, module_id, elements.len(), data))
            .map_err(|e| {
                error!("[MOD] init {} failed: {}", module_id, e);
                e
            })?;

        for (element_idx, element) in elements.iter().enumerate() {
            let element_id = Id::element(idx, element_idx);
            self.bind_id = element_id;
            self.with_handler(idx, |m, fwk| {
                m.element_init(fwk, element_id, element.sub_element_count, element.data)
            })
            .map_err(|e| {
                error!("[MOD] element init {} failed: {}", element_id, e);
                e
            })?;
            self.registry.set_state(element_id, ModuleState::Initialized);
        }

        self.bind_id = module_id;
        self.with_handler(idx, |m, fwk| m.post_init(fwk, module_id)).map_err(|e| {
            error!("[MOD] post init {} failed: {}", module_id, e);
            e
        })?;
        self.registry.set_state(module_id, ModuleState::Initialized);
        Ok(())
    }

    fn bind_module(&mut self, idx: usize, round: u32) -> FwkResult<()> {
        let last_round = round + 1 == BIND_ROUND_COUNT;
        let element_count = self.registry.get(idx).map_or(0, |ctx| ctx.elements.len());
        let ids = core::iter::once(Id::module(idx)).chain((0..element_count).map(|e| Id::element(idx, e)));

        for id in ids {
            self.bind_id = id;
            self.with_handler(idx, |m, fwk| m.bind(fwk, id, round)).map_err(|e| {
                error!("[MOD] bind {} round {} failed: {}", id, round, e);
                e
            })?;
            if last_round {
                self.registry.set_state(id, ModuleState::Bound);
            }
        }
        Ok(())
    }

    fn start_module(&mut self, idx: usize) -> FwkResult<()> {
        let element_count = self.registry.get(idx).map_or(0, |ctx| ctx.elements.len());
        let ids = core::iter::once(Id::module(idx)).chain((0..element_count).map(|e| Id::element(idx, e)));

        for id in ids {
            self.bind_id = id;
            self.with_handler(idx, |m, fwk| m.start(fwk, id)).map_err(|e| {
                error!("[MOD] start {} failed: {}", id, e);
                e
            })?;
            self.registry.set_state(id, ModuleState::Started);
        }
        Ok(())
    }

    /// Obtains API `api_id` of `target_id` on behalf of the entity currently
    /// being initialized or bound.
    ///
    /// Allowed while binding, or while initializing once the target module
    /// is initialized. `Param` for invalid or mismatched ids, `State`
    /// outside those stages or while the target module is executing.
    pub fn bind(&self, target_id: Id, api_id: Id) -> FwkResult<ApiRef> {
        let result = self.bind_inner(target_id, api_id);
        if let Err(e) = result {
            error!("[MOD] bind {} {} failed: {}", target_id, api_id, e);
        }
        result
    }

    fn bind_inner(&self, target_id: Id, api_id: Id) -> FwkResult<ApiRef> {
        if !self.topology.is_valid_entity_id(target_id)
            || !self.topology.is_valid_api_id(api_id)
            || target_id.module_idx() != api_id.module_idx()
        {
            return Err(FwkError::Param);
        }

        let ctx = self.registry.get(target_id.module_idx()).ok_or(FwkError::Param)?;
        let allowed = match self.stage {
            Stage::Initialize => ctx.state == ModuleState::Initialized,
            Stage::Bind => true,
            _ => false,
        };
        if !allowed {
            return Err(FwkError::State);
        }

        let handler = ctx.handler.as_ref().ok_or(FwkError::State)?;
        handler.process_bind_request(self.bind_id, target_id, api_id)
    }

    /// [`Framework::bind`] with the API downcast to `T`. `Handler` if the
    /// module returned an API of another type.
    pub fn bind_api<T: Any + Send + Sync>(&self, target_id: Id, api_id: Id) -> FwkResult<&'static T> {
        let api = self.bind(target_id, api_id)?;
        api.downcast_ref::<T>().ok_or_else(|| {
            error!("[MOD] API {} has an unexpected type", api_id);
            FwkError::Handler
        })
    }

    pub fn module_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_valid_module_id(&self, id: Id) -> bool {
        self.topology.is_valid_module_id(id)
    }

    pub fn is_valid_element_id(&self, id: Id) -> bool {
        self.topology.is_valid_element_id(id)
    }

    pub fn is_valid_sub_element_id(&self, id: Id) -> bool {
        self.topology.is_valid_sub_element_id(id)
    }

    pub fn is_valid_entity_id(&self, id: Id) -> bool {
        self.topology.is_valid_entity_id(id)
    }

    pub fn is_valid_api_id(&self, id: Id) -> bool {
        self.topology.is_valid_api_id(id)
    }

    pub fn is_valid_event_id(&self, id: Id) -> bool {
        self.topology.is_valid_event_id(id)
    }

    pub fn is_valid_notification_id(&self, id: Id) -> bool {
        self.topology.is_valid_notification_id(id)
    }

    /// Name of a module or element.
    pub fn name(&self, id: Id) -> Option<&'static str> {
        if self.is_valid_element_id(id) {
            let ctx = self.registry.get(id.module_idx())?;
            ctx.elements.get(id.element_idx()).map(|e| e.name)
        } else if self.is_valid_module_id(id) {
            self.registry.get(id.module_idx()).map(|ctx| ctx.desc.name)
        } else {
            None
        }
    }

    /// Configuration data of a module, element or sub-element (which
    /// reports its element's data).
    pub fn config_data(&self, id: Id) -> Option<ConfigData> {
        let ctx = self.registry.context(id)?;
        if self.is_valid_element_id(id) || self.is_valid_sub_element_id(id) {
            ctx.elements.get(id.element_idx()).map(|e| e.data)
        } else if self.is_valid_module_id(id) {
            ctx.data
        } else {
            None
        }
    }

    /// [`Framework::config_data`] downcast to `T`. `Param` for an invalid
    /// id, `Data` when there is no data of that type.
    pub fn data<T: Any>(&self, id: Id) -> FwkResult<&'static T> {
        if !self.is_valid_entity_id(id) {
            return Err(FwkError::Param);
        }
        self.config_data(id).and_then(|d| d.downcast_ref::<T>()).ok_or(FwkError::Data)
    }

    pub fn element_count(&self, module_id: Id) -> FwkResult<usize> {
        if !self.is_valid_module_id(module_id) {
            return Err(FwkError::Param);
        }
        self.registry.get(module_id.module_idx()).map(|ctx| ctx.elements.len()).ok_or(FwkError::Param)
    }

    pub fn sub_element_count(&self, element_id: Id) -> FwkResult<usize> {
        if !self.is_valid_element_id(element_id) {
            return Err(FwkError::Param);
        }
        self.registry
            .get(element_id.module_idx())
            .and_then(|ctx| ctx.elements.get(element_id.element_idx()))
            .map(|e| e.sub_element_count)
            .ok_or(FwkError::Param)
    }

    /// Lifecycle state of a module, element or sub-element.
    pub fn state(&self, id: Id) -> FwkResult<ModuleState> {
        if !self.is_valid_entity_id(id) {
            return Err(FwkError::Param);
        }
        self.registry.state(id).ok_or(FwkError::Param)
    }

    /// Display adapter printing `id` with module and element names.
    pub fn id_verbose(&self, id: Id) -> VerboseId<'_> {
        VerboseId { fwk: self, id }
    }
}

/// See [`Framework::id_verbose`].
pub struct VerboseId<'a> {
    fwk: &'a Framework,
    id: Id,
}

impl fmt::Display for VerboseId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id;
        let module_name = id.try_module_idx().and_then(|m| self.fwk.name(Id::module(m)));
        let Some(module) = module_name else {
            return fmt::Display::fmt(&id, f);
        };
        let element_name = |m: usize, e: usize| self.fwk.name(Id::element(m, e));

        match id.decode() {
            IdKind::Module { .. } => write!(f, "[MOD \"{}\"]", module),
            IdKind::Element { module: m, element } => match element_name(m, element) {
                Some(name) => write!(f, "[ELM \"{}\":\"{}\"]", module, name),
                None => write!(f, "[ELM \"{}\":{}]", module, element),
            },
            IdKind::SubElement { module: m, element, sub_element } => {
                match element_name(m, element) {
                    Some(name) => write!(f, "[SUB \"{}\":\"{}\":{}]", module, name, sub_element),
                    None => write!(f, "[SUB \"{}\":{}:{}]", module, element, sub_element),
                }
            }
            IdKind::Api { api, .. } => write!(f, "[API \"{}\":{}]", module, api),
            IdKind::Event { event, .. } => write!(f, "[EVT \"{}\":{}]", module, event),
            IdKind::Notification { notification, .. } => {
                write!(f, "[NOT \"{}\":{}]", module, notification)
            }
            IdKind::Invalid | IdKind::None => fmt::Display::fmt(&id, f),
        }
    }
}

impl fmt::Debug for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framework")
            .field("modules", &self.registry.len())
            .field("stage", &self.stage)
            .field("event_capacity", &self.event_capacity)
            .field("subscription_capacity", &self.subscription_capacity)
            .finish()
    }
}
