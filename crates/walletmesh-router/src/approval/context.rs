//! Approval Context
//!
//! One entry per outer request awaiting user confirmation. The entry is
//! keyed by the outer JSON-RPC id, not the method name; two concurrent
//! requests for the same dangerous method are two entries.

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::protocol::{ChainId, RequestId};

/// Lifecycle of a queued approval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    /// Created, not yet enqueued
    Pending,
    /// Enqueued, waiting for the user
    AwaitingApproval,
    /// User approved
    Approved,
    /// User denied, or the wait timed out
    Denied,
    /// The underlying request finished
    Complete,
}

/// A dangerous call waiting for user confirmation
#[derive(Debug, Clone)]
pub struct ApprovalContext {
    /// Outer JSON-RPC id of the `wm_call`; the unique queue key
    pub request_id: RequestId,

    /// Target chain
    pub chain_id: ChainId,

    /// Inner wallet method
    pub method: String,

    /// Inner call parameters, for UI display
    pub params: Option<Value>,

    /// Requesting origin
    pub origin: String,

    /// Originating session
    pub session_id: String,

    /// Short id for correlating with UI transaction status surfaces
    pub tx_status_id: String,

    /// Current lifecycle state
    pub state: ApprovalState,

    /// When the entry was queued
    pub queued_at: DateTime<Utc>,
}

impl ApprovalContext {
    /// Build a context for a call about to be queued
    pub fn new(
        request_id: RequestId,
        chain_id: ChainId,
        method: impl Into<String>,
        params: Option<Value>,
        origin: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            chain_id,
            method: method.into(),
            params,
            origin: origin.into(),
            session_id: session_id.into(),
            tx_status_id: short_status_id(),
            state: ApprovalState::Pending,
            queued_at: Utc::now(),
        }
    }
}

/// Short unique id for external correlation
fn short_status_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(12).collect()
}
