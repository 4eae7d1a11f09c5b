//! Test doubles shared by the unit tests.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use spin::Mutex;

use crate::event::{Event, Progress};
use crate::framework::Framework;
use crate::id::Id;
use crate::interrupt::{InterruptDriver, Isr, IsrParam, INTERRUPT_NONE};
use crate::module::{ConfigData, Module, ModuleDesc, ModuleType};
use crate::status::{FwkError, FwkResult};

/// Scriptable interrupt driver. The "current interrupt" is set by the test.
pub struct MockDriver {
    current: AtomicU32,
    enabled: Mutex<[bool; MockDriver::LINES as usize]>,
    pending: Mutex<[bool; MockDriver::LINES as usize]>,
    global_disables: AtomicUsize,
    global_enables: AtomicUsize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            current: AtomicU32::new(INTERRUPT_NONE),
            enabled: Mutex::new([false; Self::LINES as usize]),
            pending: Mutex::new([false; Self::LINES as usize]),
            global_disables: AtomicUsize::new(0),
            global_enables: AtomicUsize::new(0),
        }
    }
}

impl MockDriver {
    pub const LINES: u32 = 8;

    /// Pretends an ISR for `interrupt` is running until [`MockDriver::leave_isr`].
    pub fn enter_isr(&self, interrupt: u32) {
        self.current.store(interrupt, Ordering::Release);
    }

    pub fn leave_isr(&self) {
        self.current.store(INTERRUPT_NONE, Ordering::Release);
    }

    pub fn global_disables(&self) -> usize {
        self.global_disables.load(Ordering::Acquire)
    }

    pub fn global_enables(&self) -> usize {
        self.global_enables.load(Ordering::Acquire)
    }

    fn check(interrupt: u32) -> FwkResult<usize> {
        if interrupt < Self::LINES {
            Ok(interrupt as usize)
        } else {
            Err(FwkError::Param)
        }
    }
}

impl InterruptDriver for MockDriver {
    fn global_enable(&self) -> FwkResult<()> {
        self.global_enables.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn global_disable(&self) -> FwkResult<()> {
        self.global_disables.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn is_enabled(&self, interrupt: u32) -> FwkResult<bool> {
        Ok(self.enabled.lock()[Self::check(interrupt)?])
    }

    fn enable(&self, interrupt: u32) -> FwkResult<()> {
        self.enabled.lock()[Self::check(interrupt)?] = true;
        Ok(())
    }

    fn disable(&self, interrupt: u32) -> FwkResult<()> {
        self.enabled.lock()[Self::check(interrupt)?] = false;
        Ok(())
    }

    fn is_pending(&self, interrupt: u32) -> FwkResult<bool> {
        Ok(self.pending.lock()[Self::check(interrupt)?])
    }

    fn set_pending(&self, interrupt: u32) -> FwkResult<()> {
        self.pending.lock()[Self::check(interrupt)?] = true;
        Ok(())
    }

    fn clear_pending(&self, interrupt: u32) -> FwkResult<()> {
        self.pending.lock()[Self::check(interrupt)?] = false;
        Ok(())
    }

    fn set_isr_irq(&self, interrupt: u32, _isr: Isr) -> FwkResult<()> {
        Self::check(interrupt).map(|_| ())
    }

    fn set_isr_irq_param(&self, interrupt: u32, _isr: IsrParam, _param: usize) -> FwkResult<()> {
        Self::check(interrupt).map(|_| ())
    }

    fn set_isr_nmi(&self, _isr: Isr) -> FwkResult<()> {
        Ok(())
    }

    fn set_isr_nmi_param(&self, _isr: IsrParam, _param: usize) -> FwkResult<()> {
        Ok(())
    }

    fn set_isr_fault(&self, _isr: Isr) -> FwkResult<()> {
        Ok(())
    }

    fn get_current(&self) -> FwkResult<u32> {
        match self.current.load(Ordering::Acquire) {
            INTERRUPT_NONE => Err(FwkError::State),
            interrupt => Ok(interrupt),
        }
    }

    fn is_interrupt_context(&self) -> bool {
        self.current.load(Ordering::Acquire) != INTERRUPT_NONE
    }
}

/// One call observed by a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Init(Id),
    ElementInit(Id),
    PostInit(Id),
    Bind(Id, u32),
    Start(Id),
    Stop(Id),
    Event(Event),
    Notification(Event),
}

/// Shared log of [`Call`]s, readable after the module moved into the
/// framework.
pub type Journal = Arc<Mutex<Vec<Call>>>;

/// Module that records every lifecycle and event call.
pub struct Recorder {
    pub desc: ModuleDesc,
    pub journal: Journal,
    /// Result of `process_event`/`process_notification`.
    pub reply: FwkResult<Progress>,
    /// Set to make `start` fail.
    pub fail_start: Arc<AtomicBool>,
}

impl Recorder {
    pub fn new(name: &'static str, event_count: usize, notification_count: usize) -> Self {
        Self {
            desc: ModuleDesc {
                name,
                kind: ModuleType::Service,
                api_count: 0,
                event_count,
                notification_count,
            },
            journal: Journal::default(),
            reply: Ok(Progress::Done),
            fail_start: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn boxed(self) -> Box<dyn Module> {
        Box::new(self)
    }

    fn record(&self, call: Call) {
        self.journal.lock().push(call);
    }
}

impl Module for Recorder {
    fn desc(&self) -> ModuleDesc {
        self.desc
    }

    fn init(
        &mut self,
        _fwk: &mut Framework,
        module_id: Id,
        _element_count: usize,
        _data: Option<ConfigData>,
    ) -> FwkResult<()> {
        self.record(Call::Init(module_id));
        Ok(())
    }

    fn element_init(
        &mut self,
        _fwk: &mut Framework,
        element_id: Id,
        _sub_element_count: usize,
        _data: ConfigData,
    ) -> FwkResult<()> {
        self.record(Call::ElementInit(element_id));
        Ok(())
    }

    fn post_init(&mut self, _fwk: &mut Framework, module_id: Id) -> FwkResult<()> {
        self.record(Call::PostInit(module_id));
        Ok(())
    }

    fn bind(&mut self, _fwk: &mut Framework, id: Id, round: u32) -> FwkResult<()> {
        self.record(Call::Bind(id, round));
        Ok(())
    }

    fn start(&mut self, _fwk: &mut Framework, id: Id) -> FwkResult<()> {
        self.record(Call::Start(id));
        if self.fail_start.load(Ordering::Acquire) {
            return Err(FwkError::Device);
        }
        Ok(())
    }

    fn stop(&mut self, _fwk: &mut Framework, id: Id) -> FwkResult<()> {
        self.record(Call::Stop(id));
        Ok(())
    }

    fn process_event(
        &mut self,
        _fwk: &mut Framework,
        event: &Event,
        _response: &mut Event,
    ) -> FwkResult<Progress> {
        self.record(Call::Event(*event));
        self.reply
    }

    fn process_notification(
        &mut self,
        _fwk: &mut Framework,
        event: &Event,
        _response: &mut Event,
    ) -> FwkResult<Progress> {
        self.record(Call::Notification(*event));
        self.reply
    }
}
