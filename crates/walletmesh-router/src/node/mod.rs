//! JSON-RPC Node Layer
//!
//! Request/response correlation, method registration, the middleware chain,
//! and notification events, bound symmetrically to any transport endpoint.

pub mod middleware;
pub mod node;
pub mod pending;

pub use middleware::{HandlerFuture, Middleware, Next, RequestContext, RpcHandler};
pub use node::{JsonRpcNode, NodeConfig};
pub use pending::RequestIdGenerator;
