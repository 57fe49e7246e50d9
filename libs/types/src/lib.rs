//! # Point-to-Point Device Types
//!
//! Pure data definitions shared by every layer of the device: wire message
//! types, fixed-layout headers, rank and tag sentinels, completion status and
//! the error taxonomy.
//!
//! ## Design Philosophy
//!
//! - **Bit-exact wire layout**: headers are `repr(C)` zerocopy structs with no
//!   padding, so both peers agree on every byte
//! - **Ordered message types**: data-bearing types sort before control
//!   replies, which is what receive matching relies on
//! - **No behaviour**: decoding into tagged variants lives in `codec`, request
//!   handling in `device`
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{MessageType, WireHeader, ANY_TAG};
//!
//! let header = WireHeader::new(MessageType::DataRequestAck, 5, 0, 1);
//! assert!(header.message_type().unwrap().carries_data());
//! assert_ne!(header.tag, ANY_TAG);
//! ```

pub mod common;
pub mod protocol;

pub use common::{ErrorKind, Status};
pub use protocol::*;
