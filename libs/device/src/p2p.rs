//! Posting sends and receives
//!
//! Buffer preparation and rank validation happen here, synchronously, so
//! every argument error is returned to the call site before anything reaches
//! the transport.

use crate::comm::Communicator;
use crate::engine::Engine;
use crate::error::{DeviceError, Result};
use crate::event::OpRole;
use crate::matching;
use crate::request::{Payload, Pending, RequestHandle, RequestKind};
use bytes::Bytes;
use codec::{encode_header, Datatype};
use network::ProbeSpec;
use tracing::{debug, trace};
use types::{MessageType, PeerRank, Status, WireHeader};

/// Peer, tag and communicator of a point-to-point operation
#[derive(Clone, Copy)]
pub(crate) struct Envelope<'a> {
    pub comm: &'a Communicator,
    pub peer: i32,
    pub tag: i32,
}

impl Engine {
    pub(crate) fn start_send(
        &mut self,
        env: Envelope<'_>,
        buf: &[u8],
        count: usize,
        datatype: &Datatype,
        msg_type: MessageType,
    ) -> Result<RequestHandle> {
        let size = env.comm.size();
        let connection = match PeerRank::classify(env.peer) {
            PeerRank::Process(_) => env
                .comm
                .connection(env.peer)
                .ok_or_else(|| DeviceError::rank(env.peer, "send", size))?,
            PeerRank::Null => {
                return self.null_request(RequestKind::Send, env, Payload::None);
            }
            PeerRank::AnySource | PeerRank::Root | PeerRank::Invalid(_) => {
                return Err(DeviceError::rank(env.peer, "send", size));
            }
        };

        let data = self.pack_send(buf, count, datatype)?;
        let handle = self
            .requests
            .create(RequestKind::Send, env.comm, env.tag, env.peer)?;
        let seq = self.next_seq();
        let req = self.requests.require_mut(handle)?;
        req.connection = Some(connection);
        req.msg_type = msg_type;
        req.seq = seq;
        req.status = Status::for_send(env.tag, data.len());
        let header =
            WireHeader::new(msg_type, env.tag, req.context_id, env.comm.rank()).with_seq(seq);

        if msg_type == MessageType::DataRequestAck {
            // Ack receive goes up first so the reply can never be missed
            if let Err(err) = self.post_ack_recv(handle) {
                self.requests.remove(handle);
                return Err(err);
            }
        }

        self.requests.add_ref(handle);
        let len = data.len();
        if let Err(err) = self.post_send_op(
            OpRole::SendData(handle),
            connection,
            encode_header(&header),
            data,
        ) {
            if let Some(op) = self.requests.get_mut(handle).and_then(|req| req.ack_op.take()) {
                self.transport.cancel_recv(op);
            }
            self.requests.remove(handle);
            return Err(err);
        }

        debug!(
            request = %handle,
            %msg_type,
            tag = env.tag,
            context_id = header.context_id,
            seq,
            peer = env.peer,
            bytes = len,
            "send posted"
        );
        Ok(handle)
    }

    pub(crate) fn start_recv(
        &mut self,
        env: Envelope<'_>,
        buf: Vec<u8>,
        count: usize,
        datatype: &Datatype,
    ) -> Result<RequestHandle> {
        let size = env.comm.size();
        let connection = match PeerRank::classify(env.peer) {
            PeerRank::Process(_) => Some(
                env.comm
                    .connection(env.peer)
                    .ok_or_else(|| DeviceError::rank(env.peer, "recv", size))?,
            ),
            PeerRank::AnySource => None,
            PeerRank::Null => {
                return self.null_request(RequestKind::Recv, env, Payload::Direct(buf));
            }
            PeerRank::Root | PeerRank::Invalid(_) => {
                return Err(DeviceError::rank(env.peer, "recv", size));
            }
        };

        let need = datatype.span(count)?;
        if buf.len() < need {
            return Err(DeviceError::arg(format!(
                "receive buffer of {} bytes cannot hold {} elements ({} bytes)",
                buf.len(),
                count,
                need
            )));
        }
        let capacity = datatype.packed_len(count)?;
        let payload = if datatype.is_contiguous() {
            Payload::Direct(buf)
        } else {
            Payload::Packed {
                user: buf,
                msg: self.pack.prepare(count, datatype)?,
            }
        };

        let handle = match self
            .requests
            .create(RequestKind::Recv, env.comm, env.tag, env.peer)
        {
            Ok(handle) => handle,
            Err(err) => {
                if let Payload::Packed { msg, .. } = payload {
                    self.pack.cleanup(msg);
                }
                return Err(err);
            }
        };
        let req = self.requests.require_mut(handle)?;
        req.connection = connection;
        req.payload = payload;
        let context_id = req.context_id;

        self.requests.add_ref(handle);
        self.requests.enqueue(handle, Pending::Posted);
        let ticket = match self.post_recv_op(
            OpRole::RecvData(handle),
            connection,
            capacity,
            matching::data_predicate(env.tag, context_id),
        ) {
            Ok(ticket) => ticket,
            Err(err) => {
                self.release(handle);
                return Err(err);
            }
        };
        if let Some(req) = self.requests.get_mut(handle) {
            req.recv_op = Some(ticket.id);
        }

        debug!(
            request = %handle,
            tag = env.tag,
            context_id,
            peer = env.peer,
            capacity,
            matched = ticket.started,
            "receive posted"
        );
        Ok(handle)
    }

    /// Request addressed to the null peer: complete at once, no traffic
    fn null_request(
        &mut self,
        kind: RequestKind,
        env: Envelope<'_>,
        payload: Payload,
    ) -> Result<RequestHandle> {
        let handle = self.requests.create(kind, env.comm, env.tag, env.peer)?;
        let req = self.requests.require_mut(handle)?;
        req.status = Status::null();
        req.payload = payload;
        req.completed = true;
        trace!(request = %handle, ?kind, "null peer, completed immediately");
        Ok(handle)
    }

    fn pack_send(&self, buf: &[u8], count: usize, datatype: &Datatype) -> Result<Bytes> {
        if datatype.is_contiguous() {
            let len = datatype.packed_len(count)?;
            let data = buf.get(..len).ok_or_else(|| {
                DeviceError::arg(format!(
                    "send buffer of {} bytes shorter than {} elements ({} bytes)",
                    buf.len(),
                    count,
                    len
                ))
            })?;
            return Ok(Bytes::copy_from_slice(data));
        }

        let mut msg = self.pack.prepare(count, datatype)?;
        self.pack.pack(buf, count, &mut msg)?;
        Ok(msg.freeze())
    }

    /// Match criteria of a probe; `None` for the null peer
    pub(crate) fn probe_spec(env: Envelope<'_>, operation: &'static str) -> Result<Option<ProbeSpec>> {
        let size = env.comm.size();
        let connection = match PeerRank::classify(env.peer) {
            PeerRank::Process(_) => Some(
                env.comm
                    .connection(env.peer)
                    .ok_or_else(|| DeviceError::rank(env.peer, operation, size))?,
            ),
            PeerRank::AnySource => None,
            PeerRank::Null => return Ok(None),
            PeerRank::Root | PeerRank::Invalid(_) => {
                return Err(DeviceError::rank(env.peer, operation, size));
            }
        };
        Ok(Some(ProbeSpec {
            connection,
            accept: matching::data_predicate(env.tag, env.comm.recv_context_id()),
        }))
    }
}
