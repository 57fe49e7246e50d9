//! Engine state guarded by the device lock
//!
//! The [`Engine`] owns the request arena and the table mapping transport
//! tokens to the role of each posted operation. Every method runs with the
//! device's engine lock held; nothing here blocks.

use crate::error::{DeviceError, Result};
use crate::event::OpRole;
use crate::request::{Payload, RequestArena, RequestHandle};
use bytes::Bytes;
use codec::{ControlMessage, PackService};
use network::{AcceptFn, ConnectionId, NetCompletion, OpId, RecvPost, RecvTicket, SendPost, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use types::Status;

/// Final outcome of a request handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: Status,
    /// The receive buffer, returned to its owner
    pub buffer: Option<Vec<u8>>,
}

pub(crate) struct Engine {
    pub(crate) requests: RequestArena,
    ops: HashMap<u64, OpRole>,
    next_token: u64,
    next_seq: u32,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) pack: Arc<dyn PackService>,
}

impl Engine {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        pack: Arc<dyn PackService>,
        max_requests: usize,
    ) -> Self {
        Self {
            requests: RequestArena::new(max_requests),
            ops: HashMap::new(),
            next_token: 1,
            next_seq: 1,
            transport,
            pack,
        }
    }

    fn register(&mut self, role: OpRole) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.ops.insert(token, role);
        token
    }

    /// Sequence number for the next data send; never 0
    pub(crate) fn next_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = match seq.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        seq
    }

    pub(crate) fn post_send_op(
        &mut self,
        role: OpRole,
        connection: ConnectionId,
        xheader: Bytes,
        data: Bytes,
    ) -> Result<OpId> {
        let token = self.register(role);
        self.transport
            .post_send(SendPost {
                token,
                connection,
                xheader,
                data,
            })
            .map_err(|err| {
                self.ops.remove(&token);
                err.into()
            })
    }

    pub(crate) fn post_recv_op(
        &mut self,
        role: OpRole,
        connection: Option<ConnectionId>,
        capacity: usize,
        accept: AcceptFn,
    ) -> Result<RecvTicket> {
        let token = self.register(role);
        self.transport
            .post_recv(RecvPost {
                token,
                connection,
                capacity,
                accept,
            })
            .map_err(|err| {
                self.ops.remove(&token);
                err.into()
            })
    }

    /// Post a header-only control message; its completion is not awaited
    pub(crate) fn send_control(
        &mut self,
        connection: ConnectionId,
        message: ControlMessage,
    ) -> Result<()> {
        let msg_type = message.message_type();
        self.post_send_op(
            OpRole::ControlSend(msg_type),
            connection,
            message.encode(),
            Bytes::new(),
        )?;
        trace!(%connection, %msg_type, tag = message.common().tag, "control message posted");
        Ok(())
    }

    /// Route a transport completion to the step that posted it
    pub(crate) fn on_completion(&mut self, completion: NetCompletion) {
        let Some(role) = self.ops.remove(&completion.token) else {
            warn!(token = completion.token, "completion for unknown token");
            return;
        };

        match role {
            OpRole::SendData(handle) => self.send_done(handle, &completion),
            OpRole::RecvData(handle) => self.recv_done(handle, completion),
            OpRole::AckRecv(handle) => self.ack_done(handle, &completion),
            OpRole::ControlSend(msg_type) => {
                if !completion.state.is_success() {
                    warn!(%msg_type, state = %completion.state, "control message not delivered");
                }
            }
            OpRole::Retraction {
                connection,
                retract,
            } => self.retraction_done(connection, retract, &completion),
        }
    }

    /// Finish one protocol step; the request completes when none remain
    pub(crate) fn step_done(&mut self, handle: RequestHandle) {
        let Some(req) = self.requests.get_mut(handle) else {
            return;
        };
        req.steps = req.steps.saturating_sub(1);
        if req.steps > 0 {
            return;
        }

        req.completed = true;
        let user_ref = req.user_ref;
        debug!(
            request = %handle,
            kind = ?req.kind,
            tag = req.status.tag,
            source = req.status.source,
            cancelled = req.status.cancelled,
            error = %req.status.error,
            "request complete"
        );
        self.requests.dequeue(handle);
        if !user_ref {
            self.release(handle);
        }
    }

    /// Return a request's slot and buffers to their pools
    pub(crate) fn release(&mut self, handle: RequestHandle) -> Option<(Status, Option<String>, Payload)> {
        let req = self.requests.remove(handle)?;
        let payload = match req.payload {
            Payload::Packed { user, msg } => {
                self.pack.cleanup(msg);
                Payload::Direct(user)
            }
            other => other,
        };
        trace!(request = %handle, "request released");
        Some((req.status, req.fatal, payload))
    }

    /// Collect a completed request, dropping the caller's reference
    pub(crate) fn take_completed(&mut self, handle: RequestHandle) -> Result<Option<Completion>> {
        let req = self
            .requests
            .get(handle)
            .ok_or(DeviceError::InvalidRequest { handle })?;
        if !req.completed {
            return Ok(None);
        }

        let (status, fatal, payload) = self
            .release(handle)
            .ok_or(DeviceError::InvalidRequest { handle })?;
        if let Some(state) = fatal {
            return Err(DeviceError::fatal(state));
        }
        Ok(Some(Completion {
            status,
            buffer: payload.into_buffer(),
        }))
    }

    /// Drop the caller's reference without waiting
    pub(crate) fn request_free(&mut self, handle: RequestHandle) -> Result<()> {
        let req = self.requests.require_mut(handle)?;
        if req.completed {
            self.release(handle);
        } else {
            req.user_ref = false;
        }
        Ok(())
    }

    /// Retract every receive still posted at the transport
    pub(crate) fn cancel_outstanding(&mut self) -> usize {
        let mut cancelled = 0;
        for handle in self.requests.handles() {
            let Some(req) = self.requests.get_mut(handle) else {
                continue;
            };
            if req.completed {
                continue;
            }
            let ops = [req.recv_op.take(), req.ack_op.take()];
            for op in ops.into_iter().flatten() {
                if self.transport.cancel_recv(op) {
                    cancelled += 1;
                }
            }
        }
        cancelled
    }

    /// Operations posted at the transport and not yet completed
    pub(crate) fn outstanding_ops(&self) -> usize {
        self.ops.len()
    }
}
