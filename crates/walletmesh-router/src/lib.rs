//! WalletMesh Router - Multi-Chain JSON-RPC Routing Core
//!
//! This crate multiplexes JSON-RPC traffic from a decentralized application
//! across per-chain wallet backends, enforcing origin-bound session
//! lifetime, per-chain/per-method permissions, and per-request user
//! approval of dangerous operations.
//!
//! # Architecture
//!
//! The implementation is organized in layers:
//!
//! - **Protocol Layer** (`protocol`): JSON-RPC 2.0 framing, the `wm_*`
//!   meta-protocol wire types, and the transport abstraction
//! - **Node Layer** (`node`): symmetric JSON-RPC endpoint with request
//!   correlation, middleware, and events
//! - **Session Layer** (`session`): origin-bound session stores, in-memory
//!   and durable
//! - **Permissions Layer** (`permissions`): permissive and three-state
//!   (ALLOW/ASK/DENY) policy managers
//! - **Approval Layer** (`approval`): request-id-keyed user confirmation
//!   queue for dangerous methods
//! - **Router Layer** (`router`): the broker composing all of the above
//! - **Provider Layer** (`provider`): the dApp-side typed client
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use walletmesh_router::permissions::PermissivePermissions;
//! use walletmesh_router::protocol::ChainId;
//! use walletmesh_router::provider::{ProviderConfig, WalletProvider};
//! use walletmesh_router::router::{RouterConfig, WalletRouter};
//! use walletmesh_router::transport::InProcessTransport;
//!
//! # async fn example() -> Result<(), walletmesh_router::error::WmError> {
//! // In-process wiring: dApp <-> router <-> wallet.
//! let (dapp_side, router_side) =
//!     InProcessTransport::pair("walletmesh:router", "https://dapp.example");
//! let (wallet_side, _wallet_backend) =
//!     InProcessTransport::pair("walletmesh:router", "wallet:eip155");
//! let wallet_side: Arc<dyn walletmesh_router::protocol::Transport> = wallet_side;
//!
//! let router = WalletRouter::new(
//!     router_side,
//!     vec![(ChainId::new("eip155:1"), wallet_side)],
//!     Arc::new(PermissivePermissions::new()),
//!     None,
//!     RouterConfig::default(),
//! )?;
//!
//! let provider = WalletProvider::new(dapp_side, ProviderConfig::default());
//! let granted = provider.connect(Default::default(), None).await?;
//! println!("session: {}", granted.session_id);
//! # let _ = router;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency Model
//!
//! Every node is a single-owner endpoint: one pump task feeds inbound
//! frames, requests dispatch on their own tasks, and all shared state lives
//! in concurrent maps. Awaiting a wallet response, a user approval, or a
//! durable store is a suspension point; other requests interleave freely.

pub mod approval;
pub mod error;
pub mod node;
pub mod permissions;
pub mod protocol;
pub mod provider;
pub mod router;
pub mod session;
pub mod transport;

// Re-export commonly used types for convenience
pub use approval::{ApprovalContext, ApprovalQueue, ApprovalState};
pub use error::{WmError, WmResult};
pub use node::{JsonRpcNode, NodeConfig, RequestContext};
pub use permissions::{
    AllowAskDenyPermissions, PermissionManager, PermissionState, PermissivePermissions,
};
pub use protocol::{
    ChainId, ChainPermissions, HumanReadablePermissions, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, MethodCall, RequestId, Transport,
};
pub use provider::{ProviderConfig, WalletProvider};
pub use router::{RouterConfig, WalletRouter};
pub use session::{
    DurableSessionStore, InMemorySessionStore, SessionData, SessionStore, SessionStoreConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the crate version as a string
pub fn version() -> &'static str {
    VERSION
}
