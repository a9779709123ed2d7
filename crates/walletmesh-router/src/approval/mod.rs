//! Approval Subsystem
//!
//! Per-request user confirmation for dangerous wallet methods, keyed by the
//! outer JSON-RPC request id and wired into the router as middleware.

pub mod context;
pub mod middleware;
pub mod queue;

pub use context::{ApprovalContext, ApprovalState};
pub use middleware::ApprovalMiddleware;
pub use queue::{ApprovalOutcome, ApprovalQueue, ApprovalQueueConfig};
