//! Interrupt producers feeding the dispatch loop on the host architecture.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use arch_host::HostArch;
use fwk::{
    arch, Config, ConfigData, Event, FwkResult, Framework, Id, InterruptDriver, IsrEventSender,
    Module, ModuleConfig, ModuleDesc, ModuleEntry, ModuleType, Progress,
};

const TICK_LINE: u32 = 3;

static SENDER: spin::Once<IsrEventSender> = spin::Once::new();
static TICKS: AtomicUsize = AtomicUsize::new(0);
static LAST_CONTEXT: AtomicU32 = AtomicU32::new(0);

fn on_tick() {
    if let Some(sender) = SENDER.get() {
        let mut event = Event::new(Id::event(0, 0), Id::module(0), Id::module(0));
        let _ = sender.put_event(&mut event);
    }
}

struct Ticker;

impl Module for Ticker {
    fn desc(&self) -> ModuleDesc {
        ModuleDesc {
            name: "ticker",
            kind: ModuleType::Driver,
            api_count: 0,
            event_count: 1,
            notification_count: 0,
        }
    }

    fn init(&mut self, _: &mut Framework, _: Id, _: usize, _: Option<ConfigData>) -> FwkResult<()> {
        Ok(())
    }

    fn start(&mut self, fwk: &mut Framework, _: Id) -> FwkResult<()> {
        let sender = fwk.isr_sender()?;
        SENDER.call_once(|| sender);
        fwk.interrupt().set_isr_irq(TICK_LINE, on_tick)?;
        fwk.interrupt().enable(TICK_LINE)
    }

    fn process_event(&mut self, fwk: &mut Framework, _: &Event, _: &mut Event) -> FwkResult<Progress> {
        assert!(!fwk.is_interrupt_context());
        TICKS.fetch_add(1, Ordering::SeqCst);
        Ok(Progress::Done)
    }
}

/// Interrupts raised on another thread wake the loop and are dispatched
#[test]
fn test_ticks_from_another_thread() {
    let host = Arc::new(HostArch::new(8));
    let driver = host.driver().clone();
    let mut fwk = arch::init(
        host,
        vec![ModuleEntry::new(Box::new(Ticker), ModuleConfig::new())],
        Config::default(),
    )
    .unwrap();

    let producer = thread::spawn(move || {
        for _ in 0..5 {
            driver.raise(TICK_LINE).unwrap();
            thread::yield_now();
        }
    });

    fwk.run_while(|_| TICKS.load(Ordering::SeqCst) < 5);
    producer.join().unwrap();
    assert!(fwk.is_idle());
    arch::deinit(&mut fwk).unwrap();
}

fn record_current(param: usize) {
    let driver = arch_host::HostInterruptDriver::new(0);
    // The current interrupt is tracked per thread, not per controller.
    LAST_CONTEXT.store(driver.get_current().unwrap_or(0), Ordering::SeqCst);
    assert_eq!(param, 9);
}

/// Handlers see the line they run for as the current interrupt
#[test]
fn test_current_interrupt_inside_handler() {
    let host = HostArch::new(8);
    let driver = host.driver();
    driver.set_isr_irq_param(5, record_current, 9).unwrap();
    driver.enable(5).unwrap();
    driver.raise(5).unwrap();
    assert_eq!(LAST_CONTEXT.load(Ordering::SeqCst), 5);
    assert!(!driver.is_interrupt_context());
}
