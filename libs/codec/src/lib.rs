//! # Point-to-Point Device Codec
//!
//! ## Purpose
//!
//! The "rules" layer between the raw wire model in `types` and the device
//! engine:
//! - Decoding raw extended headers into tagged [`ControlMessage`] variants
//! - Encoding control replies for the transport
//! - Datatype layouts and the [`PackService`] used for non-contiguous buffers
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/device
//!     ↑           ↓            ↓
//! WireHeader  ControlMessage  Router / matching
//! Sentinels   PackService     Requests
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Transport plumbing (belongs in `network`)
//! - Request lifecycle or matching state (belongs in `device`)
//!
//! ## Example
//!
//! ```rust
//! use codec::{ControlMessage, Datatype, DatatypeEngine, PackService};
//! use types::{MessageType, WireHeader};
//!
//! let raw = codec::encode_header(&WireHeader::new(MessageType::Data, 7, 0, 1));
//! let msg = ControlMessage::decode(&raw).unwrap();
//! assert_eq!(msg.message_type(), MessageType::Data);
//!
//! let engine = DatatypeEngine::new();
//! let mut packed = engine.prepare(1, &Datatype::vector(2, 1, 2, 1).unwrap()).unwrap();
//! engine.pack(&[9, 0, 8], 1, &mut packed).unwrap();
//! assert_eq!(packed.as_slice(), &[9, 8]);
//! ```

pub mod datatype;
pub mod error;
pub mod message;
pub mod pack;

pub use datatype::{Datatype, Layout};
pub use error::{PackError, PackResult, ProtocolError, ProtocolResult};
pub use message::{encode_header, ControlMessage};
pub use pack::{DatatypeEngine, PackService, PackedMessage};
