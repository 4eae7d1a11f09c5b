//! Architecture seam and boot sequence
//!
//! An architecture supplies the interrupt driver, the idle primitive and,
//! optionally, a log backend. [`boot`] wires them into a [`Framework`],
//! runs the module lifecycle and enters the dispatch loop.

use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{error, info, LevelFilter};

use crate::framework::{Config, Framework};
use crate::interrupt::InterruptDriver;
use crate::logging::{self, LogBackend, Logger};
use crate::module::ModuleEntry;
use crate::status::{FwkError, FwkResult};

pub trait Arch: Send + Sync {
    /// Interrupt driver of this architecture. Called once during [`init`].
    fn interrupt_driver(&self) -> FwkResult<Arc<dyn InterruptDriver>>;

    /// Blocks until the next interrupt. A [`Arch::wake`] issued since the
    /// last suspend must make this return immediately.
    fn suspend(&self) {}

    /// Ends a pending or upcoming [`Arch::suspend`]. Called after an event
    /// is queued from interrupt context.
    fn wake(&self) -> FwkResult<()> {
        Ok(())
    }

    /// Backend for log output, if the architecture has one.
    fn log_backend(&self) -> Option<&'static dyn LogBackend> {
        None
    }

    fn log_level(&self) -> LevelFilter {
        LevelFilter::Info
    }
}

/// Builds and starts a framework on `arch`.
///
/// Driver failures abort with `Param` if the architecture rejects the
/// request and `Panic` otherwise. Lifecycle errors are returned as is.
pub fn init(arch: Arc<dyn Arch>, modules: Vec<ModuleEntry>, config: Config) -> FwkResult<Framework> {
    logging::init(arch.log_level());
    if let Some(backend) = arch.log_backend() {
        match logging::register(backend) {
            Ok(()) | Err(FwkError::Init) => {}
            Err(e) => return Err(e),
        }
    }

    let driver = arch.interrupt_driver().map_err(|e| {
        error!("[ARCH] no interrupt driver: {}", e);
        match e {
            FwkError::Param => FwkError::Param,
            _ => FwkError::Panic,
        }
    })?;

    let mut fwk = Framework::new(modules, config)?;
    fwk.set_arch(arch);
    fwk.register_interrupt_driver(driver)?;
    logging::attach_interrupt(fwk.interrupt_handle());
    fwk.start().map_err(|e| {
        error!("[ARCH] startup failed: {}", e);
        e
    })?;

    info!("[ARCH] framework ready");
    Ok(fwk)
}

/// [`init`], then the dispatch loop. Returns only if startup fails.
pub fn boot(arch: Arc<dyn Arch>, modules: Vec<ModuleEntry>, config: Config) -> FwkError {
    match init(arch, modules, config) {
        Ok(mut fwk) => fwk.run(),
        Err(e) => e,
    }
}

/// Stops every module and flushes pending log output.
///
/// Returns the first error of the stop sequence, else the flush error.
pub fn deinit(fwk: &mut Framework) -> FwkResult<()> {
    shutdown(fwk, logging::logger())
}

fn shutdown(fwk: &mut Framework, logger: &Logger) -> FwkResult<()> {
    let stopped = fwk.stop();
    let flushed = logger.flush().map_err(|e| {
        error!("[ARCH] log flush failed: {}", e);
        e
    });
    info!("[ARCH] framework stopped");
    stopped.and(flushed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Stage;
    use crate::module::{ModuleConfig, ModuleState};
    use crate::test_support::{Call, MockDriver, Recorder};
    use crate::Id;
    use alloc::vec;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TestArch {
        driver: Option<Arc<MockDriver>>,
        wakes: AtomicUsize,
    }

    impl Arch for TestArch {
        fn interrupt_driver(&self) -> FwkResult<Arc<dyn InterruptDriver>> {
            match &self.driver {
                Some(driver) => Ok(driver.clone()),
                None => Err(FwkError::Device),
            }
        }

        fn wake(&self) -> FwkResult<()> {
            self.wakes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn arch() -> Arc<TestArch> {
        Arc::new(TestArch { driver: Some(Arc::new(MockDriver::default())), ..TestArch::default() })
    }

    #[test]
    fn init_starts_every_module() {
        let recorder = Recorder::new("only", 1, 0);
        let journal = recorder.journal.clone();
        let modules = vec![ModuleEntry::new(recorder.boxed(), ModuleConfig::new())];

        let mut fwk = init(arch(), modules, Config::default()).unwrap();
        assert_eq!(fwk.stage(), Stage::Runtime);
        assert_eq!(fwk.state(Id::module(0)), Ok(ModuleState::Started));
        assert!(journal.lock().contains(&Call::Start(Id::module(0))));

        deinit(&mut fwk).unwrap();
        assert_eq!(fwk.state(Id::module(0)), Ok(ModuleState::Suspended));
        assert_eq!(journal.lock().last(), Some(&Call::Stop(Id::module(0))));
    }

    struct BrokenConsole;

    impl LogBackend for BrokenConsole {
        fn print(&self, _ch: u8) -> FwkResult<()> {
            Ok(())
        }

        fn flush(&self) -> FwkResult<()> {
            Err(FwkError::Device)
        }
    }

    static BROKEN: BrokenConsole = BrokenConsole;

    #[test]
    fn shutdown_reports_a_failed_flush() {
        let recorder = Recorder::new("only", 0, 0);
        let journal = recorder.journal.clone();
        let modules = vec![ModuleEntry::new(recorder.boxed(), ModuleConfig::new())];
        let mut fwk = init(arch(), modules, Config::default()).unwrap();

        let logger = Logger::new();
        logger.register(&BROKEN).unwrap();
        assert_eq!(shutdown(&mut fwk, &logger), Err(FwkError::Device));
        // Modules are stopped regardless.
        assert_eq!(journal.lock().last(), Some(&Call::Stop(Id::module(0))));
    }

    #[test]
    fn missing_driver_panics() {
        let arch = Arc::new(TestArch::default());
        assert_eq!(init(arch.clone(), vec![], Config::default()).err(), Some(FwkError::Panic));
        assert_eq!(boot(arch, vec![], Config::default()), FwkError::Panic);
    }

    #[test]
    fn lifecycle_failure_aborts_boot() {
        let recorder = Recorder::new("broken", 0, 0);
        recorder.fail_start.store(true, Ordering::Relaxed);
        let modules = vec![ModuleEntry::new(recorder.boxed(), ModuleConfig::new())];
        assert!(init(arch(), modules, Config::default()).is_err());
    }

    #[test]
    fn interrupt_events_wake_the_arch() {
        let arch = arch();
        let driver = arch.driver.clone().unwrap();
        let modules = vec![ModuleEntry::new(Recorder::new("only", 1, 0).boxed(), ModuleConfig::new())];
        let mut fwk = init(arch.clone(), modules, Config::default()).unwrap();

        let mut event = crate::Event::new(Id::event(0, 0), Id::module(0), Id::module(0));
        fwk.put_event(&mut event).unwrap();
        assert_eq!(arch.wakes.load(Ordering::Relaxed), 0);

        driver.enter_isr(1);
        fwk.put_event(&mut event).unwrap();
        driver.leave_isr();
        assert_eq!(arch.wakes.load(Ordering::Relaxed), 1);
    }
}
