use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::LevelFilter;

use fwk::arch::Arch;
use fwk::logging::LogBackend;
use fwk::{FwkResult, InterruptDriver};

use crate::console::STDOUT;
use crate::interrupt::HostInterruptDriver;

/// Longest time [`Arch::suspend`] blocks without a wake-up.
const IDLE_TIMEOUT: Duration = Duration::from_millis(50);

/// Host process acting as the firmware's processor.
pub struct HostArch {
    driver: Arc<HostInterruptDriver>,
    woken: Mutex<bool>,
    wakeup: Condvar,
    level: LevelFilter,
}

impl HostArch {
    pub fn new(line_count: u32) -> Self {
        Self {
            driver: Arc::new(HostInterruptDriver::new(line_count)),
            woken: Mutex::new(false),
            wakeup: Condvar::new(),
            level: LevelFilter::Info,
        }
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Controller used to raise simulated interrupts.
    pub fn driver(&self) -> &Arc<HostInterruptDriver> {
        &self.driver
    }
}

impl Arch for HostArch {
    fn interrupt_driver(&self) -> FwkResult<Arc<dyn InterruptDriver>> {
        Ok(self.driver.clone())
    }

    fn suspend(&self) {
        let woken = self.woken.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut woken, _) = self
            .wakeup
            .wait_timeout_while(woken, IDLE_TIMEOUT, |woken| !*woken)
            .unwrap_or_else(PoisonError::into_inner);
        *woken = false;
    }

    fn wake(&self) -> FwkResult<()> {
        *self.woken.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wakeup.notify_one();
        Ok(())
    }

    fn log_backend(&self) -> Option<&'static dyn LogBackend> {
        Some(&STDOUT)
    }

    fn log_level(&self) -> LevelFilter {
        self.level
    }
}
