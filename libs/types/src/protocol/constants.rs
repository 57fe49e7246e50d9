//! Protocol constants and basic types
//!
//! These are fundamental data types shared by sender and receiver. Protocol
//! logic (decoding, dispatch) remains in codec and device.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wildcard tag: a receive posted with this tag matches any tag
pub const ANY_TAG: i32 = -1;

/// Null peer: operations complete immediately without wire traffic
pub const PROC_NULL: i32 = -1;

/// Wildcard source: a receive posted with this rank matches any peer
pub const ANY_SOURCE: i32 = -2;

/// Collective root designation, never valid for point-to-point
pub const ROOT: i32 = -3;

/// Wire message types
///
/// The numeric order is part of the protocol: every type up to and including
/// [`MessageType::DataRequestAck`] carries user data and is eligible for
/// receive matching. Later types are control replies or remote-memory-access
/// traffic and are never matched by a user receive.
#[repr(u32)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    TryFromPrimitive, IntoPrimitive,
)]
pub enum MessageType {
    Data = 0,
    DataRequestAck = 1,
    DataAck = 2,
    CancelDataRequestAck = 3,
    CancelDataAck = 4,
    RmaPut = 5,
    RmaAccumulate = 6,
    RmaGetReq = 7,
    RmaLockExclusiveRequest = 8,
    RmaLockSharedRequest = 9,
    RmaUnlockRequest = 10,
}

impl MessageType {
    /// Data-bearing messages are the only ones a user receive may match
    pub fn carries_data(self) -> bool {
        self <= MessageType::DataRequestAck
    }

    /// Acknowledgement replies closing a rendezvous
    pub fn is_ack(self) -> bool {
        matches!(self, MessageType::DataAck | MessageType::CancelDataAck)
    }

    /// Remote-memory-access control traffic
    pub fn is_rma(self) -> bool {
        matches!(
            self,
            MessageType::RmaPut
                | MessageType::RmaAccumulate
                | MessageType::RmaGetReq
                | MessageType::RmaLockExclusiveRequest
                | MessageType::RmaLockSharedRequest
                | MessageType::RmaUnlockRequest
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::Data => "DATA",
            MessageType::DataRequestAck => "DATA_REQUEST_ACK",
            MessageType::DataAck => "DATA_ACK",
            MessageType::CancelDataRequestAck => "CANCEL_DATA_REQUEST_ACK",
            MessageType::CancelDataAck => "CANCEL_DATA_ACK",
            MessageType::RmaPut => "RMA_PUT",
            MessageType::RmaAccumulate => "RMA_ACCUMULATE",
            MessageType::RmaGetReq => "RMA_GET_REQ",
            MessageType::RmaLockExclusiveRequest => "RMA_LOCK_EXCLUSIVE_REQUEST",
            MessageType::RmaLockSharedRequest => "RMA_LOCK_SHARED_REQUEST",
            MessageType::RmaUnlockRequest => "RMA_UNLOCK_REQUEST",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of an integer peer rank for a point-to-point operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRank {
    /// A concrete process within the communicator
    Process(u32),
    AnySource,
    Null,
    Root,
    /// Any other negative value
    Invalid(i32),
}

impl PeerRank {
    pub fn classify(rank: i32) -> Self {
        match rank {
            r if r >= 0 => PeerRank::Process(r as u32),
            PROC_NULL => PeerRank::Null,
            ANY_SOURCE => PeerRank::AnySource,
            ROOT => PeerRank::Root,
            other => PeerRank::Invalid(other),
        }
    }
}

/// Errors raised while interpreting raw protocol values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown message type {0}")]
    UnknownMessageType(u32),
}
