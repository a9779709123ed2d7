//! Permission Management
//!
//! Policy objects queried on every forwarded call, with an interactive
//! grant flow for connect-time and update-time approval.

pub mod allow_ask_deny;
pub mod manager;
pub mod permissive;

pub use allow_ask_deny::{
    AllowAskDenyConfig, AllowAskDenyPermissions, PermissionState, PolicyTable,
};
pub use manager::{ApproveCallback, AskCallback, PermissionManager, RevokeCallback};
pub use permissive::PermissivePermissions;
