//! Per-socket transport counters
//!
//! Plain atomic counters read by tests and the demo. Updates use relaxed
//! ordering: counters are observed after the fact, never used to synchronise.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a socket
#[derive(Debug, Default)]
pub struct TransportStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    unexpected_depth: AtomicU64,
    dispatched: AtomicU64,
    canceled_recvs: AtomicU64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_send(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_receive(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Message consumed by the default-receive hook
    #[inline]
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cancel(&self) {
        self.canceled_recvs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_unexpected_depth(&self, depth: usize) {
        self.unexpected_depth.store(depth as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            unexpected_depth: self.unexpected_depth.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            canceled_recvs: self.canceled_recvs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TransportStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Messages queued with no matching receive
    pub unexpected_depth: u64,
    pub dispatched: u64,
    pub canceled_recvs: u64,
}
