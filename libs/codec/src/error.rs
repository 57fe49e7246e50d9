//! Codec errors for header decoding and datatype packing
//!
//! Each variant carries enough context to tell what was expected and what was
//! found, so a malformed control message can be diagnosed from the log line
//! alone.

use thiserror::Error;
use types::MessageType;

/// Header decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header buffer is too small for the structure its type requires
    #[error("Header too small: need {need} bytes, got {got} (context: {context})")]
    HeaderTooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Discriminant rejected by the wire model
    #[error("Invalid header: {0}")]
    InvalidHeader(#[from] types::ProtocolError),

    /// A cancellation request names a type that cannot be retracted
    #[error("Cannot retract message type {retract}: only data-bearing sends are cancellable")]
    InvalidRetraction { retract: MessageType },
}

impl ProtocolError {
    pub fn header_too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::HeaderTooSmall {
            need,
            got,
            context: context.into(),
        }
    }
}

/// Datatype construction and pack/unpack errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    /// Temporary buffer allocation failed
    #[error("Out of memory allocating {bytes} byte pack buffer")]
    OutOfMemory { bytes: usize },

    /// count * size does not fit in usize
    #[error("Message size overflow: {count} elements of {size} bytes")]
    SizeOverflow { count: usize, size: usize },

    /// User buffer does not span count * extent bytes
    #[error("Buffer too small: need {need} bytes for {count} elements, got {got}")]
    BufferTooSmall {
        need: usize,
        got: usize,
        count: usize,
    },

    /// Datatype description is malformed
    #[error("Invalid datatype: {0}")]
    InvalidDatatype(String),
}

/// Result type for header decoding
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type for pack/unpack
pub type PackResult<T> = std::result::Result<T, PackError>;
