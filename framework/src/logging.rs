//! Log service
//!
//! Sink for the `log` facade. Each record is formatted into one line of at
//! most [`LOG_COLUMNS`] characters, cut at the first newline and terminated
//! with `"\r\n"`.
//!
//! Two backends can be registered: an always-on backend usable from the
//! first instruction, and a dynamic backend that usually arrives later with
//! a driver module. With the `log-buffered` feature, lines for the dynamic
//! backend (or lines logged before any backend exists) go to a ring and are
//! written out from the dispatch loop via [`unbuffer`], one character per
//! call. Lines that cannot be stored are counted and reported once the ring
//! drains.
//!
//! Interrupt handlers log too, so once an [`Interrupt`] façade is attached
//! the logger state is only locked with interrupts masked.

use alloc::sync::Arc;
use core::fmt::{self, Write};

use heapless::String;
#[cfg(feature = "log-buffered")]
use heapless::Deque;
use log::{LevelFilter, Log, Metadata, Record};
use spin::{Mutex, Once};

use crate::event::Progress;
use crate::interrupt::Interrupt;
use crate::status::{FwkError, FwkResult};

/// Maximum characters per line, terminator excluded.
pub const LOG_COLUMNS: usize = 80;

/// Capacity of the message ring in bytes.
#[cfg(feature = "log-buffered")]
pub const LOG_BUFFER_SIZE: usize = 1024;

const TERMINATOR: &[u8] = b"\r\n";

/// Character output device.
pub trait LogBackend: Sync {
    fn print(&self, ch: u8) -> FwkResult<()>;

    fn flush(&self) -> FwkResult<()> {
        Ok(())
    }
}

/// One formatted line. Output past the first newline or the column limit is
/// dropped.
struct Line {
    text: String<LOG_COLUMNS>,
    closed: bool,
}

impl Line {
    fn new() -> Self {
        Self { text: String::new(), closed: false }
    }

    fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.text.bytes().chain(TERMINATOR.iter().copied())
    }

    fn len(&self) -> usize {
        self.text.len() + TERMINATOR.len()
    }
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.closed {
                break;
            }
            if ch == '\n' || self.text.push(ch).is_err() {
                self.closed = true;
            }
        }
        Ok(())
    }
}

struct State {
    aon_backend: Option<&'static dyn LogBackend>,
    backend: Option<&'static dyn LogBackend>,
    dropped: usize,
    #[cfg(feature = "log-buffered")]
    ring: Deque<u8, LOG_BUFFER_SIZE>,
    /// Characters of the message being unbuffered that are still in the ring.
    #[cfg(feature = "log-buffered")]
    remaining: u8,
}

/// `log` implementation backing the framework.
pub struct Logger {
    state: Mutex<State>,
    interrupt: Once<Arc<Interrupt>>,
}

static LOGGER: Logger = Logger::new();
static INSTALLED: Once<()> = Once::new();

fn print_line(backend: &dyn LogBackend, line: &Line) -> FwkResult<()> {
    for ch in line.bytes() {
        backend.print(ch).map_err(|_| FwkError::Device)?;
    }
    backend.flush().map_err(|_| FwkError::Device)
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State {
                aon_backend: None,
                backend: None,
                dropped: 0,
                #[cfg(feature = "log-buffered")]
                ring: Deque::new(),
                #[cfg(feature = "log-buffered")]
                remaining: 0,
            }),
            interrupt: Once::new(),
        }
    }

    /// Masks interrupts through `interrupt` around every later access.
    /// Only the first façade attached is kept.
    pub fn attach_interrupt(&self, interrupt: Arc<Interrupt>) {
        self.interrupt.call_once(|| interrupt);
    }

    fn locked<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        match self.interrupt.get() {
            Some(interrupt) => interrupt.critical(|| f(&mut *self.state.lock())),
            None => f(&mut *self.state.lock()),
        }
    }

    /// Registers the dynamic backend. `Init` if one is already registered.
    pub fn register(&self, backend: &'static dyn LogBackend) -> FwkResult<()> {
        self.locked(|state| {
            if state.backend.is_some() {
                return Err(FwkError::Init);
            }
            state.backend = Some(backend);
            Ok(())
        })
    }

    /// Registers the always-on backend. `Init` if one is already registered.
    pub fn register_aon(&self, backend: &'static dyn LogBackend) -> FwkResult<()> {
        self.locked(|state| {
            if state.aon_backend.is_some() {
                return Err(FwkError::Init);
            }
            state.aon_backend = Some(backend);
            Ok(())
        })
    }

    pub fn deregister(&self) -> Option<&'static dyn LogBackend> {
        self.locked(|state| state.backend.take())
    }

    pub fn deregister_aon(&self) -> Option<&'static dyn LogBackend> {
        self.locked(|state| state.aon_backend.take())
    }

    /// Messages lost since the last report.
    pub fn dropped(&self) -> usize {
        self.locked(|state| state.dropped)
    }

    fn write_line(&self, line: &Line) {
        self.locked(|state| {
            if Self::store(state, line) {
                return;
            }

            match state.backend.or(state.aon_backend) {
                Some(backend) => {
                    if print_line(backend, line).is_err() {
                        state.dropped += 1;
                    }
                }
                None => state.dropped += 1,
            }
        })
    }

    /// Buffers the line unless it can go straight to the always-on backend.
    #[cfg(feature = "log-buffered")]
    fn store(state: &mut State, line: &Line) -> bool {
        if state.backend.is_none() && state.aon_backend.is_some() {
            return false;
        }
        if !Self::buffer(&mut state.ring, line) {
            state.dropped += 1;
        }
        true
    }

    #[cfg(not(feature = "log-buffered"))]
    fn store(_state: &mut State, _line: &Line) -> bool {
        false
    }

    /// Stores a length-prefixed line. `false` when the ring is too full.
    #[cfg(feature = "log-buffered")]
    fn buffer(ring: &mut Deque<u8, LOG_BUFFER_SIZE>, line: &Line) -> bool {
        let length = line.len();
        if 1 + length > ring.capacity() - ring.len() {
            return false;
        }
        // Lines are at most LOG_COLUMNS + 2 characters long.
        let _ = ring.push_back(length as u8);
        for ch in line.bytes() {
            let _ = ring.push_back(ch);
        }
        true
    }

    /// Moves one buffered character to the dynamic backend.
    ///
    /// `Pending` while more output is waiting, `Done` once the ring is empty
    /// and no drop report is outstanding. Also `Done` while there is no
    /// dynamic backend, since nothing can be written out until one is
    /// registered.
    #[cfg(feature = "log-buffered")]
    pub fn unbuffer(&self) -> FwkResult<Progress> {
        self.locked(Self::unbuffer_one)
    }

    #[cfg(feature = "log-buffered")]
    fn unbuffer_one(state: &mut State) -> FwkResult<Progress> {
        let Some(backend) = state.backend else {
            return Ok(Progress::Done);
        };
        if state.remaining == 0 {
            match state.ring.pop_front() {
                Some(length) => state.remaining = length,
                None => {
                    if state.dropped == 0 {
                        return Ok(Progress::Done);
                    }
                    let dropped = core::mem::take(&mut state.dropped);
                    let mut line = Line::new();
                    let _ = write!(line, "[FWK] ... and {} more messages...", dropped);
                    if !Self::buffer(&mut state.ring, &line) {
                        state.dropped = dropped;
                    }
                    return Ok(Progress::Pending);
                }
            }
        }

        let Some(&ch) = state.ring.front() else {
            state.remaining = 0;
            return Ok(Progress::Pending);
        };
        backend.print(ch).map_err(|_| FwkError::Device)?;
        let _ = state.ring.pop_front();
        state.remaining -= 1;
        if state.remaining == 0 {
            backend.flush().map_err(|_| FwkError::Device)?;
        }
        Ok(Progress::Pending)
    }

    /// Nothing is ever buffered without the `log-buffered` feature.
    #[cfg(not(feature = "log-buffered"))]
    pub fn unbuffer(&self) -> FwkResult<Progress> {
        Ok(Progress::Done)
    }

    /// Drains the ring and flushes both backends.
    pub fn flush(&self) -> FwkResult<()> {
        while self.unbuffer()? == Progress::Pending {}

        let (backend, aon_backend) = self.locked(|state| (state.backend, state.aon_backend));
        for b in [backend, aon_backend].into_iter().flatten() {
            b.flush().map_err(|_| FwkError::Device)?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut line = Line::new();
        let _ = write!(line, "{}", record.args());
        self.write_line(&line);
    }

    fn flush(&self) {
        let _ = Logger::flush(self);
    }
}

/// Installs the framework logger as the `log` sink. Later calls only
/// change the level.
pub fn init(level: LevelFilter) {
    INSTALLED.call_once(|| {
        // Another sink may already be installed in host test binaries.
        let _ = log::set_logger(&LOGGER);
    });
    log::set_max_level(level);
}

/// The framework logger.
pub fn logger() -> &'static Logger {
    &LOGGER
}

/// See [`Logger::attach_interrupt`].
pub fn attach_interrupt(interrupt: Arc<Interrupt>) {
    LOGGER.attach_interrupt(interrupt)
}

pub fn register(backend: &'static dyn LogBackend) -> FwkResult<()> {
    LOGGER.register(backend)
}

pub fn register_aon(backend: &'static dyn LogBackend) -> FwkResult<()> {
    LOGGER.register_aon(backend)
}

/// See [`Logger::unbuffer`].
pub fn unbuffer() -> FwkResult<Progress> {
    LOGGER.unbuffer()
}

pub fn flush() -> FwkResult<()> {
    LOGGER.flush()
}
