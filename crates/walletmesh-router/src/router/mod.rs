//! Router Layer
//!
//! Composition of session, permission, and approval middleware over the
//! dApp-facing node, plus the wallet registry and notification mirroring.

pub mod config;
pub mod middleware;
pub mod router;
pub mod wallets;

pub use config::RouterConfig;
pub use middleware::{PermissionMiddleware, SessionMiddleware};
pub use router::WalletRouter;
pub use wallets::WalletHandle;
