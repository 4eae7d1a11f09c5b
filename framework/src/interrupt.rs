//! Interrupt façade
//!
//! The framework never talks to an interrupt controller directly. The
//! architecture registers one [`InterruptDriver`] at boot and every request
//! goes through [`Interrupt`], which adds nesting for the global mask and
//! reports `Init` until a driver is present.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, error};
use spin::Once;

use crate::status::{FwkError, FwkResult};

/// Interrupt number of the non-maskable interrupt.
pub const INTERRUPT_NMI: u32 = u32::MAX;
/// Interrupt number meaning "no interrupt".
pub const INTERRUPT_NONE: u32 = u32::MAX - 1;
/// Interrupt number of processor exceptions.
pub const INTERRUPT_EXCEPTION: u32 = u32::MAX - 2;

/// Interrupt service routine.
pub type Isr = fn();
/// Interrupt service routine taking a registration-time parameter.
pub type IsrParam = fn(usize);

/// Interrupt controller driver supplied by the architecture.
///
/// Range checks on interrupt numbers belong to the driver, which reports
/// them as `Param`.
pub trait InterruptDriver: Send + Sync {
    /// Unmasks interrupts globally.
    fn global_enable(&self) -> FwkResult<()>;
    /// Masks interrupts globally.
    fn global_disable(&self) -> FwkResult<()>;

    fn is_enabled(&self, interrupt: u32) -> FwkResult<bool>;
    fn enable(&self, interrupt: u32) -> FwkResult<()>;
    fn disable(&self, interrupt: u32) -> FwkResult<()>;

    fn is_pending(&self, interrupt: u32) -> FwkResult<bool>;
    fn set_pending(&self, interrupt: u32) -> FwkResult<()>;
    fn clear_pending(&self, interrupt: u32) -> FwkResult<()>;

    fn set_isr_irq(&self, interrupt: u32, isr: Isr) -> FwkResult<()>;
    fn set_isr_irq_param(&self, interrupt: u32, isr: IsrParam, param: usize) -> FwkResult<()>;
    fn set_isr_nmi(&self, isr: Isr) -> FwkResult<()>;
    fn set_isr_nmi_param(&self, isr: IsrParam, param: usize) -> FwkResult<()>;
    fn set_isr_fault(&self, isr: Isr) -> FwkResult<()>;

    /// Interrupt being serviced. `State` outside of interrupt context.
    fn get_current(&self) -> FwkResult<u32>;

    fn is_interrupt_context(&self) -> bool;
}

/// Indirection over the registered interrupt driver.
///
/// Shared between the framework, interrupt-side event senders and the
/// logger, so that every masked section nests on the same counter.
pub struct Interrupt {
    driver: Once<Arc<dyn InterruptDriver>>,
    /// Depth of nested global disables.
    nesting: AtomicU32,
}

impl Interrupt {
    pub const fn new() -> Self {
        Self { driver: Once::new(), nesting: AtomicU32::new(0) }
    }

    /// Registers the driver. Only one driver may be registered.
    pub fn init(&self, driver: Arc<dyn InterruptDriver>) -> FwkResult<()> {
        let mut fresh = false;
        self.driver.call_once(|| {
            fresh = true;
            driver
        });
        if !fresh {
            error!("[INT] driver already registered");
            return Err(FwkError::State);
        }
        debug!("[INT] driver registered");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.driver.is_completed()
    }

    fn driver(&self) -> FwkResult<&dyn InterruptDriver> {
        self.driver.get().map(|d| &**d).ok_or(FwkError::Init)
    }

    /// Runs `f` with interrupts globally masked.
    ///
    /// Data shared with interrupt handlers must only be locked in here: a
    /// handler preempting the lock holder would otherwise spin forever.
    /// Before a driver is registered no handler can run and `f` is called
    /// as is. Nothing is logged, so the logger can use this too.
    pub fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
        let masked = self.is_initialized() && self.global_disable().is_ok();
        let result = f();
        if masked {
            // Only fails without a matching disable, which `masked` rules out.
            let _ = self.global_enable();
        }
        result
    }

    /// Masks interrupts. Nested calls only count; the outermost one reaches
    /// the driver.
    pub fn global_disable(&self) -> FwkResult<()> {
        let driver = self.driver()?;
        if self.nesting.fetch_add(1, Ordering::AcqRel) == 0 {
            if let Err(e) = driver.global_disable() {
                self.nesting.fetch_sub(1, Ordering::AcqRel);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Undoes one [`Interrupt::global_disable`]. Interrupts are unmasked
    /// when the outermost disable is undone.
    ///
    /// Returns `State` when there is no matching disable.
    pub fn global_enable(&self) -> FwkResult<()> {
        let driver = self.driver()?;
        let depth = self
            .nesting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1))
            .map_err(|_| FwkError::State)?;
        if depth == 1 {
            driver.global_enable()?;
        }
        Ok(())
    }

    /// Current nesting depth of [`Interrupt::global_disable`].
    pub fn disable_depth(&self) -> u32 {
        self.nesting.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self, interrupt: u32) -> FwkResult<bool> {
        self.driver()?.is_enabled(interrupt)
    }

    pub fn enable(&self, interrupt: u32) -> FwkResult<()> {
        self.driver()?.enable(interrupt)
    }

    pub fn disable(&self, interrupt: u32) -> FwkResult<()> {
        self.driver()?.disable(interrupt)
    }

    pub fn is_pending(&self, interrupt: u32) -> FwkResult<bool> {
        self.driver()?.is_pending(interrupt)
    }

    pub fn set_pending(&self, interrupt: u32) -> FwkResult<()> {
        self.driver()?.set_pending(interrupt)
    }

    pub fn clear_pending(&self, interrupt: u32) -> FwkResult<()> {
        self.driver()?.clear_pending(interrupt)
    }

    pub fn set_isr_irq(&self, interrupt: u32, isr: Isr) -> FwkResult<()> {
        self.driver()?.set_isr_irq(interrupt, isr)
    }

    pub fn set_isr_irq_param(&self, interrupt: u32, isr: IsrParam, param: usize) -> FwkResult<()> {
        self.driver()?.set_isr_irq_param(interrupt, isr, param)
    }

    pub fn set_isr_nmi(&self, isr: Isr) -> FwkResult<()> {
        self.driver()?.set_isr_nmi(isr)
    }

    pub fn set_isr_nmi_param(&self, isr: IsrParam, param: usize) -> FwkResult<()> {
        self.driver()?.set_isr_nmi_param(isr, param)
    }

    pub fn set_isr_fault(&self, isr: Isr) -> FwkResult<()> {
        self.driver()?.set_isr_fault(isr)
    }

    pub fn get_current(&self) -> FwkResult<u32> {
        self.driver()?.get_current()
    }

    /// Whether the caller runs in an ISR. Always `false` without a driver.
    pub fn is_interrupt_context(&self) -> bool {
        self.driver().map_or(false, |d| d.is_interrupt_context())
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
