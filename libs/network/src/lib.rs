//! Transport Boundary
//!
//! The device talks to its transport through the [`Transport`] trait:
//! non-blocking send, receive and probe primitives, receive cancellation, a
//! completion callback ([`CompletionSink`]) and a default-receive hook
//! ([`DefaultRecv`]) for messages no posted receive accepted.
//!
//! [`Fabric`] is the provided implementation. It connects sockets living in
//! one process and is what the device's tests and demo run on.

pub mod error;
pub mod fabric;
pub mod state;
pub mod stats;
pub mod transport;

pub use error::{Result, TransportError};
pub use fabric::{Fabric, FabricSocket};
pub use state::RequestState;
pub use stats::{StatsSnapshot, TransportStats};
pub use transport::{
    AcceptFn, CompletionSink, ConnectionId, DefaultRecv, Dispatch, EndpointId, NetCompletion,
    OpId, ProbeInfo, ProbeSpec, RecvPost, RecvTicket, SendPost, Transport,
};
