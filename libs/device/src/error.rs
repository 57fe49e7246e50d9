//! Device Error Types
//!
//! Synchronous failures returned from the call site. Completion-time
//! outcomes (truncation, cancellation) are recorded in a request's
//! [`Status`](types::Status) instead; only fatal completions (an error
//! transport state, a failed unpack) surface here when the request is
//! waited on.

use crate::request::RequestHandle;
use codec::{PackError, ProtocolError};
use network::TransportError;
use thiserror::Error;
use types::ErrorKind;

/// Main device error type
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    Arg { message: String },

    /// Allocation failure, never a process abort
    #[error("Out of memory: {resource}: {message}")]
    NoMem { resource: String, message: String },

    /// Peer rank not valid for the operation
    #[error("Invalid rank {rank} for {operation} (communicator size {size})")]
    Rank {
        rank: i32,
        operation: &'static str,
        size: i32,
    },

    /// Request completed in a state it cannot recover from
    #[error("Fatal completion: {state}")]
    Fatal { state: String },

    /// Handle does not name a live request
    #[error("Invalid request handle {handle}")]
    InvalidRequest { handle: RequestHandle },

    #[error("Device already finalized")]
    Finalized,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// Create an invalid argument error
    pub fn arg(message: impl Into<String>) -> Self {
        Self::Arg {
            message: message.into(),
        }
    }

    /// Create an out-of-memory error
    pub fn no_mem(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NoMem {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn rank(rank: i32, operation: &'static str, size: i32) -> Self {
        Self::Rank {
            rank,
            operation,
            size,
        }
    }

    pub fn fatal(state: impl Into<String>) -> Self {
        Self::Fatal {
            state: state.into(),
        }
    }

    /// Map onto the status error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::Arg { .. } | DeviceError::InvalidRequest { .. } => ErrorKind::Arg,
            DeviceError::NoMem { .. } => ErrorKind::NoMem,
            DeviceError::Rank { .. } => ErrorKind::Rank,
            DeviceError::Fatal { .. }
            | DeviceError::Finalized
            | DeviceError::Transport(_)
            | DeviceError::Protocol(_) => ErrorKind::Other,
        }
    }
}

impl From<PackError> for DeviceError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::OutOfMemory { bytes } => {
                Self::no_mem("pack buffer", format!("{} bytes", bytes))
            }
            other => Self::arg(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DeviceError::rank(-3, "send", 4).kind(), ErrorKind::Rank);
        assert_eq!(DeviceError::fatal("request state:error").kind(), ErrorKind::Other);
        assert_eq!(DeviceError::Finalized.kind(), ErrorKind::Other);
        assert_eq!(
            DeviceError::from(PackError::OutOfMemory { bytes: 8 }).kind(),
            ErrorKind::NoMem
        );
        assert_eq!(
            DeviceError::from(PackError::InvalidDatatype("x".into())).kind(),
            ErrorKind::Arg
        );
    }

    #[test]
    fn test_rank_error_display() {
        let err = DeviceError::rank(-2, "send", 3);
        assert_eq!(
            err.to_string(),
            "Invalid rank -2 for send (communicator size 3)"
        );
    }
}
