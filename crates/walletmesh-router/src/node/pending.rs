//! Pending-Request Table Types
//!
//! Entries of the correlation table and the id generator behind
//! [`crate::node::JsonRpcNode::request`].

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use crate::error::WmResult;
use crate::protocol::RequestId;

/// An outbound request awaiting its response
#[derive(Debug)]
pub struct PendingCall {
    /// Completes the awaiting caller with the correlated result
    pub sender: oneshot::Sender<WmResult<serde_json::Value>>,

    /// Method name, for logs
    pub method: String,

    /// When the request was sent (UTC)
    pub sent_at: DateTime<Utc>,
}

impl PendingCall {
    /// Create a new pending entry
    pub fn new(sender: oneshot::Sender<WmResult<serde_json::Value>>, method: &str) -> Self {
        Self {
            sender,
            method: method.to_string(),
            sent_at: Utc::now(),
        }
    }
}

/// Thread-safe request id generator
///
/// A monotonically increasing counter seeded with a per-process random
/// value, so ids are unique for the node's lifetime and two nodes in the
/// same process do not collide on overlapping ranges.
#[derive(Debug)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator with a random starting point
    pub fn new() -> Self {
        // Seed stays well under i64::MAX even after a long-lived node.
        let seed: u64 = rand::thread_rng().gen_range(1..=u32::MAX as u64) << 16;
        Self {
            counter: AtomicU64::new(seed),
        }
    }

    /// Next unique id, rendered as a JSON number
    pub fn next_id(&self) -> RequestId {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        RequestId::new_number(id as i64)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Frees a pending slot if the awaiting caller goes away early
///
/// Timeout and caller cancellation both drop the request future at a
/// suspension point; without this guard the entry would sit in the table
/// until a response happened to arrive for it.
pub struct PendingGuard {
    pending: Arc<DashMap<RequestId, PendingCall>>,
    id: RequestId,
    armed: bool,
}

impl PendingGuard {
    /// Arm a guard for the given slot
    pub fn new(pending: Arc<DashMap<RequestId, PendingCall>>, id: RequestId) -> Self {
        Self {
            pending,
            id,
            armed: true,
        }
    }

    /// The slot was consumed through the normal path; do nothing on drop
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed {
            self.pending.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generator_produces_unique_ids() {
        let generator = RequestIdGenerator::new();
        let ids: HashSet<_> = (0..100).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn two_generators_start_apart() {
        // Random seeds make cross-node collisions vanishingly unlikely.
        let a = RequestIdGenerator::new().next_id();
        let b = RequestIdGenerator::new().next_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn armed_guard_clears_the_slot() {
        let pending: Arc<DashMap<RequestId, PendingCall>> = Arc::new(DashMap::new());
        let (tx, _rx) = oneshot::channel();
        let id = RequestId::new_number(1);
        pending.insert(id.clone(), PendingCall::new(tx, "test"));

        drop(PendingGuard::new(Arc::clone(&pending), id.clone()));
        assert!(!pending.contains_key(&id));
    }

    #[tokio::test]
    async fn disarmed_guard_leaves_the_slot() {
        let pending: Arc<DashMap<RequestId, PendingCall>> = Arc::new(DashMap::new());
        let (tx, _rx) = oneshot::channel();
        let id = RequestId::new_number(2);
        pending.insert(id.clone(), PendingCall::new(tx, "test"));

        let mut guard = PendingGuard::new(Arc::clone(&pending), id.clone());
        guard.disarm();
        drop(guard);
        assert!(pending.contains_key(&id));
    }
}
