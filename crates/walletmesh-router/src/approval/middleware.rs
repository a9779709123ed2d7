//! Approval Middleware
//!
//! Gates `wm_call` requests whose inner method is configured as dangerous.
//! The queue key is the outer JSON-RPC id, so a second concurrent request
//! for the same method cannot ride on the first one's approval.

// Layer 1: Standard library imports
use std::collections::HashSet;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;

// Layer 3: Internal module imports
use super::context::ApprovalContext;
use super::queue::{ApprovalOutcome, ApprovalQueue};
use crate::error::{WmError, WmResult};
use crate::node::{Middleware, Next, RequestContext};
use crate::protocol::constants::methods;
use crate::protocol::{CallParams, JsonRpcRequest};

/// Middleware holding the dangerous-method set and the queue
pub struct ApprovalMiddleware {
    queue: ApprovalQueue,
    dangerous_methods: HashSet<String>,
    timeout: Option<Duration>,
}

impl ApprovalMiddleware {
    /// Create the middleware
    ///
    /// `timeout` overrides the queue's default deadline when set.
    pub fn new(
        queue: ApprovalQueue,
        dangerous_methods: HashSet<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            queue,
            dangerous_methods,
            timeout,
        }
    }
}

#[async_trait]
impl Middleware for ApprovalMiddleware {
    async fn handle(
        &self,
        context: &RequestContext,
        request: &JsonRpcRequest,
        next: Next<'_>,
    ) -> WmResult<Value> {
        // Only single calls go through the gate; batches are decided by the
        // permission manager as one unit.
        if request.method != methods::CALL {
            return next.run(context, request).await;
        }

        let params: CallParams = match &request.params {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|error| WmError::invalid_request(error.to_string()))?,
            None => return Err(WmError::invalid_request("wm_call requires params")),
        };
        if !self.dangerous_methods.contains(&params.call.method) {
            return next.run(context, request).await;
        }

        let request_id = context
            .request_id
            .clone()
            .ok_or_else(|| WmError::invalid_request("dangerous call sent as notification"))?;
        let approval = ApprovalContext::new(
            request_id,
            params.chain_id,
            params.call.method.clone(),
            params.call.params.clone(),
            context.origin.clone(),
            params.session_id,
        );

        match self.queue.queue(approval, self.timeout).await? {
            ApprovalOutcome::Approved => next.run(context, request).await,
            ApprovalOutcome::Denied => Err(WmError::insufficient_permissions("denied")),
            ApprovalOutcome::TimedOut => Err(WmError::insufficient_permissions("timeout")),
        }
    }
}
