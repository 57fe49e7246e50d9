//! Protocol layer modules
//!
//! Message type enumeration, rank/tag sentinels and the wire headers shared
//! by every participant.

pub mod constants;
pub mod message;

pub use constants::{
    MessageType, PeerRank, ProtocolError, ANY_SOURCE, ANY_TAG, PROC_NULL, ROOT,
};
pub use message::*;
