//! Wire Header Implementation
//!
//! Every message starts with the common [`WireHeader`]. Control messages that
//! need more addressing information append a type-specific extension; the
//! extended structs embed the common header as their first field so a
//! receiver can always read the common part first and decide what follows.

use super::super::constants::{MessageType, ProtocolError, PROC_NULL};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Common wire header (20 bytes)
///
/// ```text
/// ┌──────────┬─────────┬────────────┬──────────┬──────────┐
/// │ msg_type │ tag     │ context_id │ src_rank │ seq      │
/// │ u32      │ i32     │ u32        │ i32      │ u32      │
/// └──────────┴─────────┴────────────┴──────────┴──────────┘
/// ```
///
/// All fields are 4 bytes wide so the layout has no padding and is identical
/// on both peers. `seq` identifies one send of the sending process; acks and
/// cancellation requests echo it so they can only ever name that send. Zero
/// means "no particular send" (RMA traffic, headers built by hand).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct WireHeader {
    pub msg_type: u32,
    pub tag: i32,
    pub context_id: u32,
    pub src_rank: i32,
    pub seq: u32,
}

impl WireHeader {
    /// Header size in bytes
    pub const SIZE: usize = 20;

    pub fn new(msg_type: MessageType, tag: i32, context_id: u32, src_rank: i32) -> Self {
        Self {
            msg_type: msg_type.into(),
            tag,
            context_id,
            src_rank,
            seq: 0,
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    /// Control reply header that does not identify its sender
    pub fn anonymous(msg_type: MessageType, tag: i32, context_id: u32) -> Self {
        Self::new(msg_type, tag, context_id, PROC_NULL)
    }

    /// Decode the message type discriminant
    pub fn message_type(&self) -> Result<MessageType, ProtocolError> {
        MessageType::try_from(self.msg_type)
            .map_err(|_| ProtocolError::UnknownMessageType(self.msg_type))
    }

    /// Validate fields this revision is strict about
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.message_type().map(|_| ())
    }

    /// Read the common header from the front of an extended header buffer
    pub fn peek(bytes: &[u8]) -> Option<Self> {
        Self::read_from_prefix(bytes)
    }
}

/// Cancellation request header (24 bytes)
///
/// Carries the type of the send being retracted so the receiving side knows
/// whether a failed retraction still owes the sender an acknowledgement. The
/// common part carries the send's `seq`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct CancelHeader {
    pub common: WireHeader,
    pub retract_type: u32,
}

impl CancelHeader {
    pub const SIZE: usize = 24;

    pub fn new(tag: i32, context_id: u32, src_rank: i32, retract: MessageType) -> Self {
        Self {
            common: WireHeader::new(MessageType::CancelDataRequestAck, tag, context_id, src_rank),
            retract_type: retract.into(),
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.common.seq = seq;
        self
    }

    pub fn retract_type(&self) -> Result<MessageType, ProtocolError> {
        MessageType::try_from(self.retract_type)
            .map_err(|_| ProtocolError::UnknownMessageType(self.retract_type))
    }
}

/// Remote-memory-access data header (48 bytes)
///
/// Used by put, accumulate and get requests. The u64 fields start at an
/// 8-byte boundary (offset 24) so the struct carries no hidden padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct RmaHeader {
    pub common: WireHeader,
    pub win_id: u32,
    pub target_disp: u64,
    pub length: u64,
    pub accumulate_op: u32,
    pub _pad: u32,
}

impl RmaHeader {
    pub const SIZE: usize = 48;

    pub fn new(
        msg_type: MessageType,
        context_id: u32,
        src_rank: i32,
        win_id: u32,
        target_disp: u64,
        length: u64,
    ) -> Self {
        Self {
            common: WireHeader::new(msg_type, 0, context_id, src_rank),
            win_id,
            target_disp,
            length,
            accumulate_op: 0,
            _pad: 0,
        }
    }

    pub fn with_accumulate_op(mut self, op: u32) -> Self {
        self.accumulate_op = op;
        self
    }
}

/// Remote-memory-access lock/unlock header (24 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct LockHeader {
    pub common: WireHeader,
    pub win_id: u32,
}

impl LockHeader {
    pub const SIZE: usize = 24;

    pub fn new(msg_type: MessageType, context_id: u32, src_rank: i32, win_id: u32) -> Self {
        Self {
            common: WireHeader::new(msg_type, 0, context_id, src_rank),
            win_id,
        }
    }
}
