//! Events crossing from transport callbacks into the progress loop
//!
//! Transport callbacks may fire on any thread and while the transport holds
//! its own locks. They never touch device state: the completion sink and the
//! receive router only push a [`DeviceEvent`] onto a channel. The device's
//! progress loop drains that channel under its engine lock.

use crate::request::RequestHandle;
use bytes::Bytes;
use crossbeam_channel::Sender;
use network::{CompletionSink, ConnectionId, NetCompletion};
use types::{CancelHeader, LockHeader, MessageType, RmaHeader};

#[derive(Debug)]
pub(crate) enum DeviceEvent {
    Completion(NetCompletion),
    Control(ControlEvent),
}

/// Inbound control message taken over by the receive router
#[derive(Debug)]
pub(crate) enum ControlEvent {
    /// A peer asks to retract a send it has not seen matched yet
    CancelRequest {
        connection: ConnectionId,
        header: CancelHeader,
    },
    Rma {
        connection: ConnectionId,
        request: RmaRequest,
        data: Bytes,
    },
}

/// Remote-memory-access request forwarded to an [`RmaHandler`](crate::RmaHandler)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmaRequest {
    Put(RmaHeader),
    Accumulate(RmaHeader),
    GetReq(RmaHeader),
    LockExclusive(LockHeader),
    LockShared(LockHeader),
    Unlock(LockHeader),
}

/// Completion sink feeding the device event channel
pub(crate) struct EventSink {
    tx: Sender<DeviceEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<DeviceEvent>) -> Self {
        Self { tx }
    }
}

impl CompletionSink for EventSink {
    fn complete(&self, completion: NetCompletion) {
        // Receiver only goes away with the device itself
        let _ = self.tx.send(DeviceEvent::Completion(completion));
    }
}

/// What a posted transport operation was for, keyed by its token
#[derive(Debug, Clone, Copy)]
pub(crate) enum OpRole {
    /// Data transfer of a send request
    SendData(RequestHandle),
    /// Data transfer of a receive request
    RecvData(RequestHandle),
    /// Rendezvous or cancellation reply awaited by a send
    AckRecv(RequestHandle),
    /// Fire-and-forget control reply
    ControlSend(MessageType),
    /// Receive posted to swallow a message a peer retracted
    Retraction {
        connection: ConnectionId,
        retract: MessageType,
    },
}
