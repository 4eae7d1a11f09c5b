//! Simulated interrupt controller.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{trace, warn};
use spin::Mutex;

use fwk::interrupt::{Isr, IsrParam, INTERRUPT_EXCEPTION, INTERRUPT_NMI, INTERRUPT_NONE};
use fwk::{FwkError, FwkResult, InterruptDriver};

thread_local! {
    static CURRENT: Cell<u32> = const { Cell::new(INTERRUPT_NONE) };
}

#[derive(Debug, Clone, Copy, Default)]
enum Vector {
    #[default]
    Empty,
    Plain(Isr),
    Param(IsrParam, usize),
}

#[derive(Debug, Clone, Copy, Default)]
struct Line {
    enabled: bool,
    pending: bool,
    vector: Vector,
}

/// Interrupt controller with a fixed number of lines.
///
/// A raised line is delivered immediately when it is enabled and
/// interrupts are globally unmasked; otherwise it stays pending until both
/// hold.
pub struct HostInterruptDriver {
    lines: Mutex<Vec<Line>>,
    nmi: Mutex<Vector>,
    fault: Mutex<Vector>,
    masked: AtomicBool,
}

impl HostInterruptDriver {
    pub fn new(line_count: u32) -> Self {
        Self {
            lines: Mutex::new(vec![Line::default(); line_count as usize]),
            nmi: Mutex::new(Vector::Empty),
            fault: Mutex::new(Vector::Empty),
            masked: AtomicBool::new(false),
        }
    }

    pub fn line_count(&self) -> u32 {
        self.lines.lock().len() as u32
    }

    /// Raises `interrupt`. `Param` if the line does not exist.
    pub fn raise(&self, interrupt: u32) -> FwkResult<()> {
        {
            let mut lines = self.lines.lock();
            let line = lines.get_mut(interrupt as usize).ok_or(FwkError::Param)?;
            line.pending = true;
        }
        self.deliver_pending();
        Ok(())
    }

    /// Raises the non-maskable interrupt.
    pub fn raise_nmi(&self) {
        let vector = *self.nmi.lock();
        run(INTERRUPT_NMI, vector);
    }

    /// Enters the fault handler.
    pub fn raise_fault(&self) {
        let vector = *self.fault.lock();
        run(INTERRUPT_EXCEPTION, vector);
    }

    fn deliver_pending(&self) {
        while !self.masked.load(Ordering::Acquire) {
            let next = {
                let mut lines = self.lines.lock();
                lines
                    .iter_mut()
                    .enumerate()
                    .find(|(_, line)| line.pending && line.enabled)
                    .map(|(idx, line)| {
                        line.pending = false;
                        (idx as u32, line.vector)
                    })
            };
            match next {
                Some((interrupt, vector)) => run(interrupt, vector),
                None => break,
            }
        }
    }

    fn with_line<R>(&self, interrupt: u32, f: impl FnOnce(&mut Line) -> R) -> FwkResult<R> {
        let mut lines = self.lines.lock();
        lines.get_mut(interrupt as usize).map(f).ok_or(FwkError::Param)
    }
}

fn run(interrupt: u32, vector: Vector) {
    let previous = CURRENT.with(|c| c.replace(interrupt));
    trace!("[HOST] enter isr {}", interrupt);
    match vector {
        Vector::Plain(isr) => isr(),
        Vector::Param(isr, param) => isr(param),
        Vector::Empty => warn!("[HOST] interrupt {} has no handler", interrupt),
    }
    CURRENT.with(|c| c.set(previous));
}

impl InterruptDriver for HostInterruptDriver {
    fn global_enable(&self) -> FwkResult<()> {
        self.masked.store(false, Ordering::Release);
        self.deliver_pending();
        Ok(())
    }

    fn global_disable(&self) -> FwkResult<()> {
        self.masked.store(true, Ordering::Release);
        Ok(())
    }

    fn is_enabled(&self, interrupt: u32) -> FwkResult<bool> {
        self.with_line(interrupt, |line| line.enabled)
    }

    fn enable(&self, interrupt: u32) -> FwkResult<()> {
        self.with_line(interrupt, |line| line.enabled = true)?;
        self.deliver_pending();
        Ok(())
    }

    fn disable(&self, interrupt: u32) -> FwkResult<()> {
        self.with_line(interrupt, |line| line.enabled = false)
    }

    fn is_pending(&self, interrupt: u32) -> FwkResult<bool> {
        self.with_line(interrupt, |line| line.pending)
    }

    fn set_pending(&self, interrupt: u32) -> FwkResult<()> {
        self.raise(interrupt)
    }

    fn clear_pending(&self, interrupt: u32) -> FwkResult<()> {
        self.with_line(interrupt, |line| line.pending = false)
    }

    fn set_isr_irq(&self, interrupt: u32, isr: Isr) -> FwkResult<()> {
        self.with_line(interrupt, |line| line.vector = Vector::Plain(isr))
    }

    fn set_isr_irq_param(&self, interrupt: u32, isr: IsrParam, param: usize) -> FwkResult<()> {
        self.with_line(interrupt, |line| line.vector = Vector::Param(isr, param))
    }

    fn set_isr_nmi(&self, isr: Isr) -> FwkResult<()> {
        *self.nmi.lock() = Vector::Plain(isr);
        Ok(())
    }

    fn set_isr_nmi_param(&self, isr: IsrParam, param: usize) -> FwkResult<()> {
        *self.nmi.lock() = Vector::Param(isr, param);
        Ok(())
    }

    fn set_isr_fault(&self, isr: Isr) -> FwkResult<()> {
        *self.fault.lock() = Vector::Plain(isr);
        Ok(())
    }

    fn get_current(&self) -> FwkResult<u32> {
        match CURRENT.with(Cell::get) {
            INTERRUPT_NONE => Err(FwkError::State),
            interrupt => Ok(interrupt),
        }
    }

    fn is_interrupt_context(&self) -> bool {
        CURRENT.with(Cell::get) != INTERRUPT_NONE
    }
}
