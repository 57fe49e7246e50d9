//! Completion dispatcher
//!
//! Translates the transport's final state of a data transfer into the
//! request's status. Runs inside the progress loop, never inside a transport
//! callback, so it may freely post replies and touch the request arena.

use crate::engine::Engine;
use crate::request::{Payload, RequestHandle};
use codec::ControlMessage;
use network::{ConnectionId, NetCompletion, RequestState};
use tracing::{debug, error, trace, warn};
use types::{ErrorKind, MessageType, WireHeader};

fn fatal_state(state: RequestState) -> String {
    format!("request state:{}", state)
}

impl Engine {
    pub(crate) fn send_done(&mut self, handle: RequestHandle, completion: &NetCompletion) {
        let Some(req) = self.requests.get_mut(handle) else {
            trace!(request = %handle, "send completion for released request");
            return;
        };

        let state = completion.state;
        let mut abandoned_ack = None;
        if state.is_success() {
            trace!(request = %handle, bytes = completion.data_len, "send data delivered");
        } else if state.is_canceled() {
            req.status.cancelled = true;
        } else {
            req.status.error = ErrorKind::Other;
            req.fatal = Some(fatal_state(state));
            // No ack will follow a send that never arrived
            abandoned_ack = req.ack_op.take();
            error!(request = %handle, %state, "send failed");
        }

        if let Some(op) = abandoned_ack {
            self.transport.cancel_recv(op);
        }
        self.step_done(handle);
    }

    pub(crate) fn recv_done(&mut self, handle: RequestHandle, completion: NetCompletion) {
        let pack = self.pack.clone();
        let Some(req) = self.requests.get_mut(handle) else {
            warn!(request = %handle, "receive completion for released request");
            return;
        };
        req.recv_op = None;

        let state = completion.state;
        let delivered = state.is_success() || state.is_truncated();
        let mut unpack_failure = None;
        if delivered {
            let stored = &completion.data;
            match &mut req.payload {
                Payload::Direct(buf) => {
                    let n = stored.len().min(buf.len());
                    buf[..n].copy_from_slice(&stored[..n]);
                }
                Payload::Packed { user, msg } => {
                    if pack.needs_unpack(msg) {
                        if let Err(err) = pack.unpack(stored, user, msg) {
                            error!(request = %handle, %err, "unpack failed");
                            unpack_failure = Some(err);
                        }
                    } else {
                        let n = stored.len().min(user.len());
                        user[..n].copy_from_slice(&stored[..n]);
                    }
                }
                Payload::None => {}
            }
        }

        // Temporary buffer and datatype reference go before the status update
        req.payload = match std::mem::replace(&mut req.payload, Payload::None) {
            Payload::Packed { user, msg } => {
                pack.cleanup(msg);
                Payload::Direct(user)
            }
            other => other,
        };

        let header = WireHeader::peek(&completion.xheader);
        if let Some(header) = &header {
            req.status.source = header.src_rank;
            req.status.tag = header.tag;
        }

        if let Some(err) = unpack_failure {
            req.status.error = ErrorKind::Other;
            req.status.count = 0;
            req.fatal = Some(format!("unpack failed: {}", err));
        } else if state.is_canceled() {
            req.status.error = ErrorKind::Success;
            req.status.cancelled = true;
            req.status.count = 0;
        } else if state.is_truncated() {
            req.status.error = ErrorKind::Truncate;
            req.status.count = completion.data.len();
            warn!(
                request = %handle,
                stored = completion.data.len(),
                sent = completion.data_len,
                "receive truncated"
            );
        } else if state.is_success() {
            req.status.error = ErrorKind::Success;
            req.status.count = completion.data_len;
        } else {
            req.status.error = ErrorKind::Other;
            req.fatal = Some(fatal_state(state));
            error!(request = %handle, %state, "receive failed");
        }

        let rank = req.comm.rank();
        let sync_sender = header
            .filter(|h| h.msg_type == u32::from(MessageType::DataRequestAck))
            .zip(completion.connection);
        if let (true, Some((header, connection))) = (delivered, sync_sender) {
            self.reply_ack(connection, MessageType::DataAck, &header, rank);
        }

        self.requests.dequeue(handle);
        self.step_done(handle);
    }

    pub(crate) fn retraction_done(
        &mut self,
        connection: ConnectionId,
        retract: MessageType,
        completion: &NetCompletion,
    ) {
        let state = completion.state;
        if state.is_canceled() {
            trace!(%connection, %retract, "retraction receive withdrawn");
        } else if state.is_success() || state.is_truncated() {
            debug!(
                %connection,
                %retract,
                bytes = completion.data_len,
                "retracted message discarded"
            );
        } else {
            warn!(%connection, %retract, %state, "retraction receive failed");
        }
    }

    /// Post a header-only reply to `connection`
    pub(crate) fn reply_ack(
        &mut self,
        connection: ConnectionId,
        msg_type: MessageType,
        about: &WireHeader,
        src_rank: i32,
    ) {
        let reply =
            WireHeader::new(msg_type, about.tag, about.context_id, src_rank).with_seq(about.seq);
        let message = match msg_type {
            MessageType::CancelDataAck => ControlMessage::CancelDataAck(reply),
            _ => ControlMessage::DataAck(reply),
        };
        match self.send_control(connection, message) {
            Ok(()) => debug!(%connection, %msg_type, tag = about.tag, "ack sent"),
            Err(err) => error!(%connection, %msg_type, %err, "ack could not be sent"),
        }
    }
}

