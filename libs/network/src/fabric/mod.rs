//! In-process transport fabric
//!
//! A [`Fabric`] connects any number of [`FabricSocket`]s living in the same
//! process. Each socket keeps two queues:
//!
//! - **posted**: receives waiting for a message, scanned in posting order
//! - **generated**: messages that arrived before any receive accepted them
//!
//! An arriving message is offered to the posted receives first, then to the
//! default-receive hook, and is queued as generated only if neither takes it.
//! Posting a receive scans the generated queue first. Sends are eager: the
//! message is placed at the peer before the send completes.

mod socket;

pub use socket::FabricSocket;

use crate::error::{Result, TransportError};
use crate::transport::EndpointId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub(crate) struct FabricShared {
    sockets: RwLock<Vec<Arc<socket::SocketCore>>>,
    next_op: AtomicU64,
}

impl FabricShared {
    pub(crate) fn next_op(&self) -> u64 {
        self.next_op.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn socket(&self, endpoint: EndpointId) -> Result<Arc<socket::SocketCore>> {
        self.sockets
            .read()
            .get(endpoint.0 as usize)
            .cloned()
            .ok_or(TransportError::UnknownEndpoint {
                endpoint: endpoint.0,
            })
    }
}

/// Shared medium connecting in-process sockets
#[derive(Clone)]
pub struct Fabric {
    shared: Arc<FabricShared>,
}

impl Fabric {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(FabricShared {
                sockets: RwLock::new(Vec::new()),
                next_op: AtomicU64::new(1),
            }),
        }
    }

    /// Open a new socket; endpoints are numbered in opening order
    pub fn open(&self) -> Arc<FabricSocket> {
        let mut sockets = self.shared.sockets.write();
        let endpoint = EndpointId(sockets.len() as u32);
        let core = Arc::new(socket::SocketCore::new(endpoint));
        sockets.push(core.clone());
        debug!(%endpoint, "fabric socket opened");
        Arc::new(FabricSocket::new(core, self.shared.clone()))
    }

    /// Open `count` sockets at once
    pub fn open_many(&self, count: usize) -> Vec<Arc<FabricSocket>> {
        (0..count).map(|_| self.open()).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.sockets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Fabric {
    fn default() -> Self {
        Self::new()
    }
}
