//! Request objects and their arena
//!
//! Every in-flight send or receive is a [`Request`] stored in a slab arena and
//! addressed by a [`RequestHandle`]. Handles carry a serial number so a handle
//! to a released slot is detected instead of aliasing the slot's next owner.
//!
//! A request's reference count has two parts: one user reference, held from
//! creation until the request is waited on or freed, and one reference per
//! protocol step still in flight (the data transfer, an ack wait). The request
//! completes when its step count reaches zero and is released when, in
//! addition, the user reference is gone.

use crate::comm::Communicator;
use crate::error::{DeviceError, Result};
use codec::PackedMessage;
use network::{ConnectionId, OpId};
use slab::Slab;
use std::collections::VecDeque;
use std::fmt;
use types::{MessageType, Status};

/// Stable handle to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    key: usize,
    serial: u64,
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}.{}", self.key, self.serial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Send,
    Recv,
}

/// Which pending list a request sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    None,
    /// Receive waiting for a message
    Posted,
    /// Send waiting for its peer's ack or cancel reply
    AwaitingAck,
}

/// User buffer attached to a receive
pub(crate) enum Payload {
    None,
    /// Contiguous buffer filled in place
    Direct(Vec<u8>),
    /// Non-contiguous buffer plus the packed temporary it is unpacked from
    Packed { user: Vec<u8>, msg: PackedMessage },
}

impl Payload {
    pub(crate) fn into_buffer(self) -> Option<Vec<u8>> {
        match self {
            Payload::None => None,
            Payload::Direct(buf) => Some(buf),
            Payload::Packed { user, .. } => Some(user),
        }
    }
}

pub(crate) struct Request {
    serial: u64,
    pub kind: RequestKind,
    pub tag: i32,
    pub context_id: u32,
    pub peer: i32,
    pub connection: Option<ConnectionId>,
    /// Held for the request's lifetime
    pub comm: Communicator,
    pub payload: Payload,
    pub status: Status,
    /// Transport state string of a fatal completion
    pub fatal: Option<String>,
    pub steps: u32,
    pub user_ref: bool,
    pub completed: bool,
    pub pending: Pending,
    /// Posted data receive, retractable until matched
    pub recv_op: Option<OpId>,
    /// Posted ack receive of a send
    pub ack_op: Option<OpId>,
    pub msg_type: MessageType,
    /// Wire sequence number of a send, echoed by its ack and cancel
    pub seq: u32,
    pub cancel_requested: bool,
}

/// Slab-backed request storage with the posted and ack-waiting lists
pub(crate) struct RequestArena {
    slots: Slab<Request>,
    capacity: usize,
    next_serial: u64,
    posted: VecDeque<RequestHandle>,
    awaiting_ack: VecDeque<RequestHandle>,
}

impl RequestArena {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Slab::with_capacity(capacity.min(1024)),
            capacity,
            next_serial: 1,
            posted: VecDeque::new(),
            awaiting_ack: VecDeque::new(),
        }
    }

    /// Allocate a request holding one user reference and no protocol steps
    pub(crate) fn create(
        &mut self,
        kind: RequestKind,
        comm: &Communicator,
        tag: i32,
        peer: i32,
    ) -> Result<RequestHandle> {
        if self.slots.len() >= self.capacity {
            return Err(DeviceError::no_mem(
                "request arena",
                format!("{} requests in flight", self.slots.len()),
            ));
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        let context_id = match kind {
            RequestKind::Send => comm.context_id(),
            RequestKind::Recv => comm.recv_context_id(),
        };
        let key = self.slots.insert(Request {
            serial,
            kind,
            tag,
            context_id,
            peer,
            connection: None,
            comm: comm.clone(),
            payload: Payload::None,
            status: Status::null(),
            fatal: None,
            steps: 0,
            user_ref: true,
            completed: false,
            pending: Pending::None,
            recv_op: None,
            ack_op: None,
            msg_type: MessageType::Data,
            seq: 0,
            cancel_requested: false,
        });
        Ok(RequestHandle { key, serial })
    }

    pub(crate) fn get(&self, handle: RequestHandle) -> Option<&Request> {
        self.slots
            .get(handle.key)
            .filter(|req| req.serial == handle.serial)
    }

    pub(crate) fn get_mut(&mut self, handle: RequestHandle) -> Option<&mut Request> {
        self.slots
            .get_mut(handle.key)
            .filter(|req| req.serial == handle.serial)
    }

    pub(crate) fn require_mut(&mut self, handle: RequestHandle) -> Result<&mut Request> {
        self.get_mut(handle)
            .ok_or(DeviceError::InvalidRequest { handle })
    }

    /// Register a protocol step that must finish before completion
    pub(crate) fn add_ref(&mut self, handle: RequestHandle) {
        if let Some(req) = self.get_mut(handle) {
            req.steps += 1;
        }
    }

    pub(crate) fn enqueue(&mut self, handle: RequestHandle, list: Pending) {
        self.dequeue(handle);
        let Some(req) = self.get_mut(handle) else {
            return;
        };
        req.pending = list;
        match list {
            Pending::Posted => self.posted.push_back(handle),
            Pending::AwaitingAck => self.awaiting_ack.push_back(handle),
            Pending::None => {}
        }
    }

    pub(crate) fn dequeue(&mut self, handle: RequestHandle) {
        let Some(req) = self.get_mut(handle) else {
            return;
        };
        let list = std::mem::replace(&mut req.pending, Pending::None);
        match list {
            Pending::Posted => self.posted.retain(|h| *h != handle),
            Pending::AwaitingAck => self.awaiting_ack.retain(|h| *h != handle),
            Pending::None => {}
        }
    }

    /// Remove a request from the arena
    pub(crate) fn remove(&mut self, handle: RequestHandle) -> Option<Request> {
        self.get(handle)?;
        self.dequeue(handle);
        Some(self.slots.remove(handle.key))
    }

    pub(crate) fn posted_len(&self) -> usize {
        self.posted.len()
    }

    pub(crate) fn awaiting_ack_len(&self) -> usize {
        self.awaiting_ack.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Requests with protocol steps still running
    pub(crate) fn in_flight(&self) -> usize {
        self.slots.iter().filter(|(_, req)| req.steps > 0).count()
    }

    pub(crate) fn handles(&self) -> Vec<RequestHandle> {
        self.slots
            .iter()
            .map(|(key, req)| RequestHandle {
                key,
                serial: req.serial,
            })
            .collect()
    }
}
