use std::io::{self, Write};

use fwk::logging::LogBackend;
use fwk::{FwkError, FwkResult};

/// Log backend writing to the process standard output.
pub struct StdoutBackend;

pub static STDOUT: StdoutBackend = StdoutBackend;

impl LogBackend for StdoutBackend {
    fn print(&self, ch: u8) -> FwkResult<()> {
        io::stdout().lock().write_all(&[ch]).map_err(|_| FwkError::Device)
    }

    fn flush(&self) -> FwkResult<()> {
        io::stdout().lock().flush().map_err(|_| FwkError::Device)
    }
}
