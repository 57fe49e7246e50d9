//! Receive dispatch router
//!
//! Installed as the transport's default-receive hook. It sees every inbound
//! message no posted receive accepted, decides from the header alone whether
//! the message is ordinary traffic or a control request, and hands control
//! requests to the progress loop as events.
//!
//! ```text
//! DATA                     -> Unhandled (fast path, not decoded)
//! DATA_REQUEST_ACK, acks   -> Unhandled (queued for matching)
//! CANCEL_DATA_REQUEST_ACK  -> Consumed, cancellation handler
//! RMA put/acc/get/lock/... -> Consumed, RmaHandler
//! ```

use crate::event::{ControlEvent, DeviceEvent, RmaRequest};
use bytes::Bytes;
use codec::ControlMessage;
use crossbeam_channel::Sender;
use network::{ConnectionId, DefaultRecv, Dispatch};
use tracing::{debug, error, warn};
use types::{LockHeader, MessageType, RmaHeader, WireHeader};

/// Handlers for remote-memory-access control traffic
///
/// Called from the device's progress loop, outside the engine lock.
/// Implementations synthesize their own replies.
pub trait RmaHandler: Send + Sync {
    fn put(&self, connection: ConnectionId, header: &RmaHeader, data: &Bytes);
    fn accumulate(&self, connection: ConnectionId, header: &RmaHeader, data: &Bytes);
    fn get_request(&self, connection: ConnectionId, header: &RmaHeader);
    fn lock_exclusive(&self, connection: ConnectionId, header: &LockHeader);
    fn lock_shared(&self, connection: ConnectionId, header: &LockHeader);
    fn unlock(&self, connection: ConnectionId, header: &LockHeader);
}

/// Default handler for processes without exposed windows: log and drop
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRmaHandler;

impl RmaHandler for LoggingRmaHandler {
    fn put(&self, connection: ConnectionId, header: &RmaHeader, data: &Bytes) {
        warn!(%connection, win_id = header.win_id, bytes = data.len(), "RMA put dropped: no window");
    }

    fn accumulate(&self, connection: ConnectionId, header: &RmaHeader, data: &Bytes) {
        warn!(
            %connection,
            win_id = header.win_id,
            op = header.accumulate_op,
            bytes = data.len(),
            "RMA accumulate dropped: no window"
        );
    }

    fn get_request(&self, connection: ConnectionId, header: &RmaHeader) {
        warn!(%connection, win_id = header.win_id, length = header.length, "RMA get dropped: no window");
    }

    fn lock_exclusive(&self, connection: ConnectionId, header: &LockHeader) {
        warn!(%connection, win_id = header.win_id, "RMA exclusive lock dropped: no window");
    }

    fn lock_shared(&self, connection: ConnectionId, header: &LockHeader) {
        warn!(%connection, win_id = header.win_id, "RMA shared lock dropped: no window");
    }

    fn unlock(&self, connection: ConnectionId, header: &LockHeader) {
        warn!(%connection, win_id = header.win_id, "RMA unlock dropped: no window");
    }
}

/// Invoke the handler method for one forwarded request
pub(crate) fn forward_rma(
    handler: &dyn RmaHandler,
    connection: ConnectionId,
    request: RmaRequest,
    data: &Bytes,
) {
    match request {
        RmaRequest::Put(h) => handler.put(connection, &h, data),
        RmaRequest::Accumulate(h) => handler.accumulate(connection, &h, data),
        RmaRequest::GetReq(h) => handler.get_request(connection, &h),
        RmaRequest::LockExclusive(h) => handler.lock_exclusive(connection, &h),
        RmaRequest::LockShared(h) => handler.lock_shared(connection, &h),
        RmaRequest::Unlock(h) => handler.unlock(connection, &h),
    }
}

/// Default-receive hook of a device
pub(crate) struct ReceiveRouter {
    tx: Sender<DeviceEvent>,
}

impl ReceiveRouter {
    pub(crate) fn new(tx: Sender<DeviceEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: ControlEvent) -> Dispatch {
        if self.tx.send(DeviceEvent::Control(event)).is_err() {
            warn!("control message dropped: device gone");
        }
        Dispatch::Consumed
    }
}

impl DefaultRecv for ReceiveRouter {
    fn dispatch(&self, connection: ConnectionId, xheader: &Bytes, data: &Bytes) -> Dispatch {
        let is_data = WireHeader::peek(xheader)
            .map_or(false, |h| h.msg_type == u32::from(MessageType::Data));
        if is_data {
            return Dispatch::Unhandled;
        }

        let message = match ControlMessage::decode(xheader) {
            Ok(message) => message,
            Err(err) => {
                error!(%connection, %err, "malformed control header dropped");
                return Dispatch::Consumed;
            }
        };

        let request = match message {
            ControlMessage::Data(_)
            | ControlMessage::DataRequestAck(_)
            | ControlMessage::DataAck(_)
            | ControlMessage::CancelDataAck(_) => return Dispatch::Unhandled,
            ControlMessage::CancelDataRequestAck(header) => {
                debug!(%connection, tag = header.common.tag, "cancel request routed");
                return self.forward(ControlEvent::CancelRequest { connection, header });
            }
            ControlMessage::RmaPut(h) => RmaRequest::Put(h),
            ControlMessage::RmaAccumulate(h) => RmaRequest::Accumulate(h),
            ControlMessage::RmaGetReq(h) => RmaRequest::GetReq(h),
            ControlMessage::RmaLockExclusive(h) => RmaRequest::LockExclusive(h),
            ControlMessage::RmaLockShared(h) => RmaRequest::LockShared(h),
            ControlMessage::RmaUnlock(h) => RmaRequest::Unlock(h),
        };

        debug!(%connection, msg_type = %message.message_type(), "RMA request routed");
        self.forward(ControlEvent::Rma {
            connection,
            request,
            data: data.clone(),
        })
    }
}
