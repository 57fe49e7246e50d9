//! Communicators: rank, endpoint table and context id
//!
//! A communicator owns the connection table used to resolve peer ranks. The
//! device only borrows it: every request holds a clone for as long as it is
//! in flight, so the table outlives any operation posted against it.

use network::ConnectionId;
use std::sync::Arc;

struct CommInner {
    rank: i32,
    context_id: u32,
    recv_context_id: u32,
    endpoints: Vec<ConnectionId>,
}

/// Shared handle to a communicator
#[derive(Clone)]
pub struct Communicator {
    inner: Arc<CommInner>,
    context_offset: u32,
}

impl Communicator {
    /// Intra-communicator: sends and receives use the same context id
    pub fn new(rank: i32, context_id: u32, endpoints: Vec<ConnectionId>) -> Self {
        Self {
            inner: Arc::new(CommInner {
                rank,
                context_id,
                recv_context_id: context_id,
                endpoints,
            }),
            context_offset: 0,
        }
    }

    pub fn rank(&self) -> i32 {
        self.inner.rank
    }

    pub fn size(&self) -> i32 {
        self.inner.endpoints.len() as i32
    }

    /// Context id stamped on outgoing messages
    pub fn context_id(&self) -> u32 {
        self.inner.context_id + self.context_offset
    }

    /// Context id inbound messages must carry to match
    pub fn recv_context_id(&self) -> u32 {
        self.inner.recv_context_id + self.context_offset
    }

    /// Connection to `rank`, if it is inside the communicator
    pub fn connection(&self, rank: i32) -> Option<ConnectionId> {
        usize::try_from(rank)
            .ok()
            .and_then(|idx| self.inner.endpoints.get(idx).copied())
    }

    /// View of the same group on the collective context
    ///
    /// Collective traffic built on top of point-to-point uses offset 1 so it
    /// can never match user messages on the same communicator.
    pub fn collective(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            context_offset: 1,
        }
    }

    /// Same group and endpoint table under a fresh context id
    pub(crate) fn derive(&self, context_id: u32) -> Self {
        Self::new(self.inner.rank, context_id, self.inner.endpoints.clone())
    }

    /// Live handles to the underlying group, including in-flight requests
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .field("context_id", &self.context_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use network::EndpointId;

    fn world(rank: i32) -> Communicator {
        let endpoints = (0..3).map(|n| ConnectionId(EndpointId(n))).collect();
        Communicator::new(rank, 0, endpoints)
    }

    #[test]
    fn test_connection_lookup_bounds() {
        let comm = world(1);
        assert_eq!(comm.size(), 3);
        assert_eq!(comm.connection(2), Some(ConnectionId(EndpointId(2))));
        assert_eq!(comm.connection(3), None);
        assert_eq!(comm.connection(-1), None);
    }

    #[test]
    fn test_collective_view_offsets_context() {
        let comm = world(0);
        let coll = comm.collective();
        assert_eq!(coll.context_id(), 1);
        assert_eq!(coll.recv_context_id(), 1);
        assert_eq!(comm.ref_count(), 2);
    }

    #[test]
    fn test_derive_keeps_group() {
        let comm = world(2);
        let dup = comm.derive(4);
        assert_eq!(dup.rank(), 2);
        assert_eq!(dup.context_id(), 4);
        assert_eq!(dup.connection(0), comm.connection(0));
    }
}
