//! Error classification shared by status reporting and call-site errors
//!
//! Completion-time failures are recorded into a request's status as an
//! [`ErrorKind`]; synchronous failures are returned as crate-specific error
//! enums that map onto the same taxonomy.

use serde::{Deserialize, Serialize};

/// Error classes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorKind {
    #[default]
    Success,
    /// Invalid argument, e.g. a malformed registration
    Arg,
    /// Allocation failure
    NoMem,
    /// Invalid peer rank for the given operation
    Rank,
    /// Receive buffer smaller than the delivered message. Recoverable.
    Truncate,
    /// Unexpected transport state. Fatal-class, always surfaced.
    Other,
}

impl ErrorKind {
    pub fn is_success(self) -> bool {
        self == ErrorKind::Success
    }

    /// Fatal-class kinds are propagated as errors from the blocking call
    /// that observes them instead of only being recorded in a status.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Other | ErrorKind::NoMem)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Success => "SUCCESS",
            ErrorKind::Arg => "ERR_ARG",
            ErrorKind::NoMem => "ERR_NO_MEM",
            ErrorKind::Rank => "ERR_RANK",
            ErrorKind::Truncate => "ERR_TRUNCATE",
            ErrorKind::Other => "ERR_OTHER",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
