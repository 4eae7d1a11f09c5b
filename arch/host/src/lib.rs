//! Host architecture
//!
//! Runs firmware images as an ordinary process. Interrupts are raised by
//! software through [`HostInterruptDriver::raise`] and their handlers run
//! synchronously on the raising thread, which is considered to be in
//! interrupt context for the duration.

mod arch;
mod console;
mod interrupt;

pub use arch::HostArch;
pub use console::{StdoutBackend, STDOUT};
pub use interrupt::HostInterruptDriver;
