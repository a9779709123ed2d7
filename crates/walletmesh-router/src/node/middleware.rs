//! Middleware Chain
//!
//! Middlewares compose in FIFO registration order around method dispatch.
//! Each one sees the request context and the raw frame, and decides whether
//! to call [`Next::run`]; an error return aborts the chain and becomes the
//! JSON-RPC error response.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::error::WmResult;
use crate::protocol::{JsonRpcRequest, RequestId};

/// Per-request context threaded through the chain
///
/// The origin comes from the transport's message context and cannot be
/// forged by the request payload.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Originator attested by the transport
    pub origin: String,

    /// Outer JSON-RPC id; `None` for notifications
    pub request_id: Option<RequestId>,

    /// When the frame arrived
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    /// Build a context for an inbound request
    pub fn new(origin: impl Into<String>, request_id: Option<RequestId>) -> Self {
        Self {
            origin: origin.into(),
            request_id,
            received_at: Utc::now(),
        }
    }
}

/// Future type returned by method handlers
pub type HandlerFuture = BoxFuture<'static, WmResult<Value>>;

/// A registered method handler
///
/// Implemented for free by closures of the shape
/// `Fn(RequestContext, Option<Value>) -> HandlerFuture`.
pub trait RpcHandler: Send + Sync {
    /// Execute the method
    fn handle(&self, context: RequestContext, params: Option<Value>) -> HandlerFuture;
}

impl<F> RpcHandler for F
where
    F: Fn(RequestContext, Option<Value>) -> HandlerFuture + Send + Sync,
{
    fn handle(&self, context: RequestContext, params: Option<Value>) -> HandlerFuture {
        self(context, params)
    }
}

/// A link in the dispatch chain
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect the request; call `next.run(..)` to continue, or return an
    /// error to abort
    async fn handle(
        &self,
        context: &RequestContext,
        request: &JsonRpcRequest,
        next: Next<'_>,
    ) -> WmResult<Value>;
}

/// The remainder of the chain, ending at the method handler
pub struct Next<'a> {
    pub(crate) chain: &'a [Arc<dyn Middleware>],
    pub(crate) endpoint: &'a dyn RpcHandler,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain
    pub async fn run(self, context: &RequestContext, request: &JsonRpcRequest) -> WmResult<Value> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    chain: rest,
                    endpoint: self.endpoint,
                };
                head.handle(context, request, next).await
            }
            None => {
                self.endpoint
                    .handle(context.clone(), request.params.clone())
                    .await
            }
        }
    }
}
