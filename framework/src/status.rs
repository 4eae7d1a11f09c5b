//! Status codes
//!
//! Framework errors carry the numeric codes shared with firmware written
//! against the classic `FWK_E_*` status values, so they can cross ABI and
//! logging boundaries unchanged.

use core::fmt;

/// Framework error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FwkError {
    /// Invalid parameter(s)
    Param,
    /// Invalid alignment
    Alignment,
    /// Invalid size
    Size,
    /// Invalid handler or resource
    Handler,
    /// Invalid access
    Access,
    /// Value out of range
    Range,
    /// Operation timed out
    Timeout,
    /// Memory allocation failed
    NoMem,
    /// Invalid power state
    PowerState,
    /// Not supported or disabled
    Support,
    /// Device error
    Device,
    /// Device busy
    Busy,
    /// Context-specific failure
    Os,
    /// Unexpected or invalid data received
    Data,
    /// Invalid state for the operation
    State,
    /// Not initialized
    Init,
    /// Data overwritten
    Overwritten,
    /// Unrecoverable error
    Panic,
}

/// Framework result type
pub type FwkResult<T> = Result<T, FwkError>;

/// Code of a successful operation.
pub const SUCCESS: i32 = 0;
/// Code of an operation that completes later.
pub const PENDING: i32 = 1;

impl FwkError {
    /// Numeric status code.
    pub const fn code(self) -> i32 {
        match self {
            FwkError::Param => -1,
            FwkError::Alignment => -2,
            FwkError::Size => -3,
            FwkError::Handler => -4,
            FwkError::Access => -5,
            FwkError::Range => -6,
            FwkError::Timeout => -7,
            FwkError::NoMem => -8,
            FwkError::PowerState => -9,
            FwkError::Support => -10,
            FwkError::Device => -11,
            FwkError::Busy => -12,
            FwkError::Os => -13,
            FwkError::Data => -14,
            FwkError::State => -15,
            FwkError::Init => -16,
            FwkError::Overwritten => -17,
            FwkError::Panic => -18,
        }
    }

    /// Error for a negative status code, `None` for anything else.
    pub const fn from_code(code: i32) -> Option<FwkError> {
        Some(match code {
            -1 => FwkError::Param,
            -2 => FwkError::Alignment,
            -3 => FwkError::Size,
            -4 => FwkError::Handler,
            -5 => FwkError::Access,
            -6 => FwkError::Range,
            -7 => FwkError::Timeout,
            -8 => FwkError::NoMem,
            -9 => FwkError::PowerState,
            -10 => FwkError::Support,
            -11 => FwkError::Device,
            -12 => FwkError::Busy,
            -13 => FwkError::Os,
            -14 => FwkError::Data,
            -15 => FwkError::State,
            -16 => FwkError::Init,
            -17 => FwkError::Overwritten,
            -18 => FwkError::Panic,
            _ => return None,
        })
    }

    /// Short mnemonic used in log lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            FwkError::Param => "E_PARAM",
            FwkError::Alignment => "E_ALIGN",
            FwkError::Size => "E_SIZE",
            FwkError::Handler => "E_HANDLER",
            FwkError::Access => "E_ACCESS",
            FwkError::Range => "E_RANGE",
            FwkError::Timeout => "E_TIMEOUT",
            FwkError::NoMem => "E_NOMEM",
            FwkError::PowerState => "E_PWRSTATE",
            FwkError::Support => "E_SUPPORT",
            FwkError::Device => "E_DEVICE",
            FwkError::Busy => "E_BUSY",
            FwkError::Os => "E_OS",
            FwkError::Data => "E_DATA",
            FwkError::State => "E_STATE",
            FwkError::Init => "E_INIT",
            FwkError::Overwritten => "E_OVERWRITTEN",
            FwkError::Panic => "E_PANIC",
        }
    }
}

impl fmt::Display for FwkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// Converts a result into the numeric status convention.
pub fn to_status<T>(result: &FwkResult<T>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.code(),
    }
}
