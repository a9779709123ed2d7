//! Approval Queue
//!
//! Serializes user confirmation of dangerous calls, keyed by the outer
//! JSON-RPC request id. Each entry blocks its own caller until the UI
//! resolves it or its deadline passes; approval of one request never
//! authorizes another, whatever the method.
//!
//! The queue is UI-agnostic: a listener registered with
//! [`ApprovalQueue::on_queued`] fires synchronously when an entry lands,
//! and the UI answers through [`ApprovalQueue::resolve`].

// Layer 1: Standard library imports
use std::sync::{Arc, RwLock};
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::context::{ApprovalContext, ApprovalState};
use crate::error::{WmError, WmResult};
use crate::protocol::constants::{defaults, env};
use crate::protocol::RequestId;

/// How a queued approval ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The user approved the call
    Approved,
    /// The user denied the call
    Denied,
    /// Nobody answered before the deadline
    TimedOut,
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct ApprovalQueueConfig {
    /// Deadline for entries queued without their own timeout
    pub default_timeout: Duration,
}

impl Default for ApprovalQueueConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(defaults::APPROVAL_TIMEOUT_MS),
        }
    }
}

impl ApprovalQueueConfig {
    /// Defaults, with `WM_APPROVAL_TIMEOUT_MS` honored when set
    pub fn from_env() -> Self {
        let default_timeout = std::env::var(env::APPROVAL_TIMEOUT_MS)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(defaults::APPROVAL_TIMEOUT_MS));
        Self { default_timeout }
    }
}

type QueueListener = Arc<dyn Fn(&ApprovalContext) + Send + Sync>;

struct QueueInner {
    pending: DashMap<RequestId, ApprovalContext>,
    resolvers: DashMap<RequestId, oneshot::Sender<ApprovalOutcome>>,
    timeouts: DashMap<RequestId, JoinHandle<()>>,
    listeners: RwLock<Vec<QueueListener>>,
    config: ApprovalQueueConfig,
}

/// Request-id-keyed approval gate
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct ApprovalQueue {
    inner: Arc<QueueInner>,
}

impl ApprovalQueue {
    /// Create a queue
    pub fn new(config: ApprovalQueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: DashMap::new(),
                resolvers: DashMap::new(),
                timeouts: DashMap::new(),
                listeners: RwLock::new(Vec::new()),
                config,
            }),
        }
    }

    /// Register a listener fired synchronously as entries are queued
    pub fn on_queued<F>(&self, listener: F)
    where
        F: Fn(&ApprovalContext) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.inner.listeners.write() {
            listeners.push(Arc::new(listener));
        }
    }

    /// Queue a call and await the user's decision
    ///
    /// # Errors
    ///
    /// [`WmError::DuplicateRequestId`] when the outer id is already queued;
    /// an internal error when the queue shuts down mid-wait.
    pub async fn queue(
        &self,
        mut context: ApprovalContext,
        timeout: Option<Duration>,
    ) -> WmResult<ApprovalOutcome> {
        let request_id = context.request_id.clone();
        let timeout = timeout.unwrap_or(self.inner.config.default_timeout);

        context.state = ApprovalState::AwaitingApproval;
        match self.inner.pending.entry(request_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(WmError::DuplicateRequestId {
                    id: request_id.to_string(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(context.clone());
            }
        }

        let (sender, receiver) = oneshot::channel();
        self.inner.resolvers.insert(request_id.clone(), sender);

        let deadline_queue = self.clone();
        let deadline_id = request_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if deadline_queue.finish(&deadline_id, ApprovalOutcome::TimedOut) {
                debug!(id = %deadline_id, "approval timed out");
            }
        });
        self.inner.timeouts.insert(request_id.clone(), handle);

        // Fire listeners after both maps hold the entry, so a UI resolving
        // from inside the callback finds it.
        self.notify_queued(&context);

        match receiver.await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(WmError::internal("approval queue shut down")),
        }
    }

    /// Resolve an awaiting entry; called by the UI
    ///
    /// # Errors
    ///
    /// [`WmError::InvalidRequest`] when no entry with this id is awaiting.
    pub fn resolve(&self, request_id: &RequestId, approved: bool) -> WmResult<()> {
        let outcome = if approved {
            ApprovalOutcome::Approved
        } else {
            ApprovalOutcome::Denied
        };
        if self.finish(request_id, outcome) {
            Ok(())
        } else {
            Err(WmError::invalid_request(format!(
                "no pending approval for request {request_id}"
            )))
        }
    }

    /// The entry for an id, if still awaiting
    pub fn get_pending(&self, request_id: &RequestId) -> Option<ApprovalContext> {
        self.inner
            .pending
            .get(request_id)
            .map(|entry| entry.value().clone())
    }

    /// Every awaiting entry, oldest first
    pub fn get_all_pending(&self) -> Vec<ApprovalContext> {
        let mut entries: Vec<ApprovalContext> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|context| context.queued_at);
        entries
    }

    /// Whether an id is awaiting approval
    pub fn has_pending(&self, request_id: &RequestId) -> bool {
        self.inner.pending.contains_key(request_id)
    }

    /// Number of awaiting entries
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Reject every awaiting entry; called on shutdown
    ///
    /// Callers observe an internal shutdown error, not a denial.
    pub fn cleanup_all(&self) {
        let ids: Vec<RequestId> = self
            .inner
            .resolvers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        if !ids.is_empty() {
            warn!(count = ids.len(), "rejecting pending approvals on shutdown");
        }
        for id in ids {
            // Dropping the sender makes the awaiting side observe shutdown.
            self.inner.resolvers.remove(&id);
            if let Some((_, handle)) = self.inner.timeouts.remove(&id) {
                handle.abort();
            }
            self.inner.pending.remove(&id);
        }
    }

    /// Complete an entry and clear all three maps; returns whether it existed
    fn finish(&self, request_id: &RequestId, outcome: ApprovalOutcome) -> bool {
        let Some((_, sender)) = self.inner.resolvers.remove(request_id) else {
            return false;
        };
        if let Some(mut entry) = self.inner.pending.get_mut(request_id) {
            entry.state = match outcome {
                ApprovalOutcome::Approved => ApprovalState::Approved,
                ApprovalOutcome::Denied | ApprovalOutcome::TimedOut => ApprovalState::Denied,
            };
        }
        self.inner.pending.remove(request_id);
        if let Some((_, handle)) = self.inner.timeouts.remove(request_id) {
            if outcome != ApprovalOutcome::TimedOut {
                handle.abort();
            }
        }
        if sender.send(outcome).is_err() {
            debug!(id = %request_id, "approval resolved after caller left");
        }
        true
    }

    fn notify_queued(&self, context: &ApprovalContext) {
        let listeners: Vec<QueueListener> = match self.inner.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => Vec::new(),
        };
        for listener in listeners {
            listener(context);
        }
    }
}
