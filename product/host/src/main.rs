//! Host firmware image
//!
//! Boots the module table on the host architecture, drives the timer
//! interrupt from a clock thread and stops once the boot sequencer reports
//! every power domain on.

mod modules;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arch_host::HostArch;
use fwk::{arch, Config};
use log::{error, info, LevelFilter};

const IRQ_COUNT: u32 = 16;
const HEAP_SIZE: usize = 4096;
const TICK_PERIOD: Duration = Duration::from_millis(10);

fn main() -> ExitCode {
    let host = Arc::new(HostArch::new(IRQ_COUNT).with_log_level(LevelFilter::Info));
    let driver = host.driver().clone();
    let config = Config {
        heap: Some(Box::leak(vec![0; HEAP_SIZE].into_boxed_slice())),
        ..Config::default()
    };

    let mut fwk = match arch::init(host, modules::table(), config) {
        Ok(fwk) => fwk,
        Err(e) => {
            error!("[MAIN] boot failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let clock = {
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                thread::sleep(TICK_PERIOD);
                if let Err(e) = driver.raise(modules::timer::IRQ) {
                    error!("[MAIN] timer interrupt failed: {}", e);
                    break;
                }
            }
        })
    };

    fwk.run_while(|_| !modules::boot::is_complete());

    running.store(false, Ordering::Release);
    let _ = clock.join();

    match arch::deinit(&mut fwk) {
        Ok(()) => {
            info!("[MAIN] shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("[MAIN] shutdown failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
