//! Rendezvous for synchronous sends
//!
//! A synchronous send goes out as `DATA_REQUEST_ACK`. The sender keeps an
//! extra step on its request, backed by a receive for the peer's reply, and
//! only completes once `DATA_ACK` (or `CANCEL_DATA_ACK`) has arrived. The
//! receiving side emits that reply from its completion dispatcher.

use crate::engine::Engine;
use crate::error::{DeviceError, Result};
use crate::event::OpRole;
use crate::matching;
use crate::request::{Pending, RequestHandle};
use network::NetCompletion;
use tracing::{debug, error, trace};
use types::{ErrorKind, MessageType, WireHeader};

impl Engine {
    /// Post the receive for a send's ack and hold a step for it
    pub(crate) fn post_ack_recv(&mut self, handle: RequestHandle) -> Result<()> {
        let req = self.requests.require_mut(handle)?;
        let (tag, context_id, seq) = (req.tag, req.context_id, req.seq);
        let connection = req
            .connection
            .ok_or_else(|| DeviceError::arg("ack wait on a send without a peer"))?;

        let ticket = self.post_recv_op(
            OpRole::AckRecv(handle),
            Some(connection),
            0,
            matching::ack_predicate(tag, context_id, seq),
        )?;
        self.requests.add_ref(handle);
        if let Some(req) = self.requests.get_mut(handle) {
            req.ack_op = Some(ticket.id);
        }
        self.requests.enqueue(handle, Pending::AwaitingAck);

        trace!(request = %handle, tag, context_id, seq, %connection, "waiting for ack");
        Ok(())
    }

    pub(crate) fn ack_done(&mut self, handle: RequestHandle, completion: &NetCompletion) {
        let Some(req) = self.requests.get_mut(handle) else {
            trace!(request = %handle, "ack for released request");
            return;
        };
        req.ack_op = None;

        let state = completion.state;
        if state.is_canceled() {
            // Ack wait withdrawn locally, e.g. at finalize
            if req.status.error.is_success() {
                req.status.cancelled = true;
            }
        } else if state.is_success() {
            let msg_type = WireHeader::peek(&completion.xheader).and_then(|h| h.message_type().ok());
            if msg_type == Some(MessageType::CancelDataAck) {
                req.status.cancelled = true;
            }
            debug!(
                request = %handle,
                ack = ?msg_type,
                cancelled = req.status.cancelled,
                "ack received"
            );
        } else {
            req.status.error = ErrorKind::Other;
            req.fatal = Some(format!("request state:{}", state));
            error!(request = %handle, %state, "ack receive failed");
        }

        self.requests.dequeue(handle);
        self.step_done(handle);
    }
}
