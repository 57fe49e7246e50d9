//! Cancellation
//!
//! Receives are cancelled locally by retracting them from the transport.
//!
//! Sends need the peer's cooperation. The sender posts (or reuses) an ack
//! receive and sends `CANCEL_DATA_REQUEST_ACK` naming the tag, context id,
//! type and sequence number of the send. The peer tries to swallow that
//! still-unmatched message with a retraction receive:
//!
//! - found: the message is discarded and `CANCEL_DATA_ACK` goes back, so the
//!   sender completes with `cancelled` set
//! - not found: the peer already matched it. The retraction is withdrawn. A
//!   synchronous send gets its `DATA_ACK` from the receive completion; a
//!   standard send is answered with `DATA_ACK` here
//!
//! Which outcome happens depends on timing; both are terminal and valid.

use crate::engine::Engine;
use crate::error::{DeviceError, Result};
use crate::event::OpRole;
use crate::matching;
use crate::request::{RequestHandle, RequestKind};
use codec::ControlMessage;
use network::ConnectionId;
use tracing::{debug, error, trace};
use types::{CancelHeader, MessageType, PROC_NULL};

impl Engine {
    /// Request cancellation; never fails on a live request
    pub(crate) fn cancel(&mut self, handle: RequestHandle) -> Result<()> {
        let req = self.requests.require_mut(handle)?;
        if req.completed || req.cancel_requested {
            return Ok(());
        }
        req.cancel_requested = true;
        let (kind, recv_op) = (req.kind, req.recv_op);

        match kind {
            RequestKind::Recv => {
                if let Some(op) = recv_op {
                    if self.transport.cancel_recv(op) {
                        debug!(request = %handle, "posted receive retracted");
                    } else {
                        trace!(request = %handle, "receive already matched, cancel ignored");
                    }
                }
                Ok(())
            }
            RequestKind::Send => self.cancel_send(handle),
        }
    }

    fn cancel_send(&mut self, handle: RequestHandle) -> Result<()> {
        let req = self.requests.require_mut(handle)?;
        let (tag, context_id, msg_type, seq) =
            (req.tag, req.context_id, req.msg_type, req.seq);
        let rank = req.comm.rank();
        let waiting_for_ack = req.ack_op.is_some();
        let connection = req
            .connection
            .ok_or_else(|| DeviceError::arg("cancel of a send without a peer"))?;

        if !waiting_for_ack {
            self.post_ack_recv(handle)?;
        }
        let header = CancelHeader::new(tag, context_id, rank, msg_type).with_seq(seq);
        self.send_control(connection, ControlMessage::CancelDataRequestAck(header))?;

        debug!(request = %handle, tag, context_id, seq, %connection, %msg_type, "send cancel requested");
        Ok(())
    }

    /// Peer side of a send cancellation
    pub(crate) fn on_cancel_request(&mut self, connection: ConnectionId, header: CancelHeader) {
        let retract = match header.retract_type() {
            Ok(retract) => retract,
            Err(err) => {
                error!(%connection, %err, "cancel request with invalid retract type");
                return;
            }
        };
        let common = header.common;

        let ticket = match self.post_recv_op(
            OpRole::Retraction {
                connection,
                retract,
            },
            Some(connection),
            usize::MAX,
            matching::retraction_predicate(
                retract,
                common.tag,
                common.context_id,
                common.seq,
            ),
        ) {
            Ok(ticket) => ticket,
            Err(err) => {
                error!(%connection, %err, "retraction receive could not be posted");
                return;
            }
        };

        // A retraction that cannot be withdrawn has matched after all
        let retracted = ticket.started || !self.transport.cancel_recv(ticket.id);
        if retracted {
            debug!(%connection, tag = common.tag, %retract, "unmatched send retracted");
            self.reply_ack(connection, MessageType::CancelDataAck, &common, PROC_NULL);
        } else {
            debug!(%connection, tag = common.tag, %retract, "send already matched, cancel declined");
            if retract == MessageType::Data {
                self.reply_ack(connection, MessageType::DataAck, &common, PROC_NULL);
            }
        }
    }
}
