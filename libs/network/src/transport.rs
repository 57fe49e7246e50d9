//! Transport boundary consumed by the device
//!
//! The device sees the transport as a set of non-blocking primitives plus a
//! completion callback. Every posted operation carries an opaque `token`
//! chosen by the caller; the transport hands it back inside the
//! [`NetCompletion`] so the caller can find its own bookkeeping.
//!
//! Callbacks run on whatever thread drives the transport. They may fire while
//! the transport holds internal locks, so sinks and hooks must only record or
//! forward work and never call back into the transport.

use crate::error::Result;
use crate::state::RequestState;
use crate::stats::StatsSnapshot;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identity of a socket within a transport fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub u32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

/// Connection from the local socket to one remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub EndpointId);

impl ConnectionId {
    pub fn remote(self) -> EndpointId {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn->{}", self.0)
    }
}

/// Transport-assigned operation id, used to cancel posted receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(pub u64);

/// Accept predicate evaluated against the extended header of an inbound message
pub type AcceptFn = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// A send to post
#[derive(Clone)]
pub struct SendPost {
    pub token: u64,
    pub connection: ConnectionId,
    pub xheader: Bytes,
    pub data: Bytes,
}

/// A receive to post
#[derive(Clone)]
pub struct RecvPost {
    pub token: u64,
    /// `None` offers the predicate to every connection
    pub connection: Option<ConnectionId>,
    /// Bytes the receive can store; longer messages complete truncated
    pub capacity: usize,
    pub accept: AcceptFn,
}

/// Result of posting a receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvTicket {
    pub id: OpId,
    /// The receive matched an already queued message while being posted
    pub started: bool,
}

/// Match criteria for probing without consuming
#[derive(Clone)]
pub struct ProbeSpec {
    pub connection: Option<ConnectionId>,
    pub accept: AcceptFn,
}

/// A queued message found by a probe
#[derive(Debug, Clone)]
pub struct ProbeInfo {
    pub connection: ConnectionId,
    pub xheader: Bytes,
    pub data_len: usize,
}

/// Outcome of one posted operation
#[derive(Debug, Clone)]
pub struct NetCompletion {
    pub token: u64,
    pub op: OpId,
    pub state: RequestState,
    /// Peer the message came from or went to
    pub connection: Option<ConnectionId>,
    pub xheader: Bytes,
    /// Bytes actually stored, at most the posted capacity
    pub data: Bytes,
    /// Full length of the message as sent
    pub data_len: usize,
}

/// Receiver of completion callbacks
pub trait CompletionSink: Send + Sync {
    fn complete(&self, completion: NetCompletion);
}

impl CompletionSink for crossbeam_channel::Sender<NetCompletion> {
    fn complete(&self, completion: NetCompletion) {
        // A dropped receiver means the owner is gone; nothing left to notify
        let _ = self.send(completion);
    }
}

/// Verdict of the default-receive hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Leave the message for ordinary matching and queuing
    Unhandled,
    /// The hook took ownership; the message is not queued
    Consumed,
}

/// Hook invoked for every inbound message that matched no posted receive
pub trait DefaultRecv: Send + Sync {
    fn dispatch(&self, connection: ConnectionId, xheader: &Bytes, data: &Bytes) -> Dispatch;
}

/// Non-blocking message transport with completion callbacks
pub trait Transport: Send + Sync {
    fn local_endpoint(&self) -> EndpointId;

    /// Resolve a connection to `remote`
    fn connect(&self, remote: EndpointId) -> Result<ConnectionId>;

    /// Install the callback receiving every completion of this socket
    fn set_completion_sink(&self, sink: Arc<dyn CompletionSink>);

    fn post_send(&self, post: SendPost) -> Result<OpId>;

    fn post_recv(&self, post: RecvPost) -> Result<RecvTicket>;

    /// Wait up to `timeout` for a queued message matching `spec`
    fn probe(&self, spec: &ProbeSpec, timeout: Duration) -> Result<Option<ProbeInfo>>;

    fn iprobe(&self, spec: &ProbeSpec) -> Result<Option<ProbeInfo>>;

    /// Retract a posted receive that has not matched yet
    ///
    /// Returns `true` if the receive was still posted; it then completes with
    /// [`RequestState::CANCELED`].
    fn cancel_recv(&self, id: OpId) -> bool;

    /// Install the default-receive hook
    ///
    /// Installing the same hook again is a no-op; a different hook is an error.
    fn set_default_recv(&self, hook: Arc<dyn DefaultRecv>) -> Result<()>;

    fn clear_default_recv(&self);

    fn stats(&self) -> StatsSnapshot;
}
