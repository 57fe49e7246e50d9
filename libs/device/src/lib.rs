//! # Point-to-Point Device
//!
//! ## Purpose
//!
//! The engine between an application's non-blocking send/receive/probe
//! calls and a generic reliable transport:
//! - Requests in a slab arena addressed by serial-checked handles
//! - Tag/context matching evaluated by the transport against raw headers
//! - Completion dispatch translating transport states into [`Status`](types::Status)
//! - Rendezvous for synchronous sends (`DATA_REQUEST_ACK` / `DATA_ACK`)
//! - Two-phase cancellation of unmatched sends
//! - A receive router steering control traffic off the data fast path
//!
//! ## Architecture Role
//!
//! ```text
//! application ──► Device ──► Engine (arena, matching, protocols)
//!                   ▲              │ post_send / post_recv / cancel_recv
//!                   │              ▼
//!             event channel ◄── Transport (CompletionSink, ReceiveRouter)
//! ```
//!
//! Transport callbacks never touch engine state. They enqueue events, and
//! `wait`/`test`/`probe` apply them under the engine lock.
//!
//! ## Example
//!
//! ```rust
//! use codec::Datatype;
//! use device::DeviceBuilder;
//! use network::{Fabric, Transport};
//! use std::sync::Arc;
//!
//! let fabric = Fabric::new();
//! let sockets = fabric.open_many(2);
//! let endpoints: Vec<_> = sockets.iter().map(|s| s.local_endpoint()).collect();
//! let ranks: Vec<_> = sockets
//!     .iter()
//!     .map(|s| DeviceBuilder::new(s.clone(), endpoints.clone()).init().unwrap())
//!     .collect();
//!
//! let byte = Datatype::byte();
//! ranks[0].send(b"hello", 5, &byte, 1, 7, ranks[0].world()).unwrap();
//! let done = ranks[1].recv(vec![0; 8], 8, &byte, 0, 7, ranks[1].world()).unwrap();
//! assert_eq!(done.status.count, 5);
//! assert_eq!(&done.buffer.unwrap()[..5], b"hello");
//! ```

mod cancel;
pub mod comm;
mod completion;
pub mod device;
mod engine;
pub mod error;
mod event;
pub mod matching;
mod p2p;
mod rendezvous;
pub mod request;
pub mod router;

pub use comm::Communicator;
pub use device::{Device, DeviceBuilder, FinalizeReport};
pub use engine::Completion;
pub use error::{DeviceError, Result};
pub use event::RmaRequest;
pub use request::{RequestHandle, RequestKind};
pub use router::{LoggingRmaHandler, RmaHandler};
