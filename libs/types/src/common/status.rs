//! Completion status of a point-to-point operation

use super::errors::ErrorKind;
use crate::protocol::{ANY_TAG, PROC_NULL};
use serde::{Deserialize, Serialize};

/// Outcome of a send, receive or probe
///
/// `count` is in bytes. For a receive it is the number of bytes actually
/// stored, which is clamped to the buffer capacity on truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub source: i32,
    pub tag: i32,
    pub count: usize,
    pub cancelled: bool,
    pub error: ErrorKind,
}

impl Status {
    /// Status reported for operations addressed to the null peer
    pub fn null() -> Self {
        Self {
            source: PROC_NULL,
            tag: ANY_TAG,
            count: 0,
            cancelled: false,
            error: ErrorKind::Success,
        }
    }

    /// Initial status of a send: tag known, source unresolved
    pub fn for_send(tag: i32, count: usize) -> Self {
        Self {
            source: PROC_NULL,
            tag,
            count,
            cancelled: false,
            error: ErrorKind::Success,
        }
    }

    pub fn is_null(&self) -> bool {
        self.source == PROC_NULL && self.count == 0 && !self.cancelled
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::null()
    }
}
