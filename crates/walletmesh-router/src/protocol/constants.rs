//! Meta-Protocol Constants
//!
//! This module defines constants for the `wm_*` meta-protocol method names,
//! router-emitted notification names, wire error codes, and default values,
//! to ensure consistency and reduce typos.

/// Router meta-protocol method names
pub mod methods {
    /// Create a new session with requested permissions
    pub const CONNECT: &str = "wm_connect";
    /// Re-bind an existing session
    pub const RECONNECT: &str = "wm_reconnect";
    /// Tear down a session
    pub const DISCONNECT: &str = "wm_disconnect";

    /// Forward a single inner call to a wallet
    pub const CALL: &str = "wm_call";
    /// Forward an ordered batch of inner calls to a wallet
    pub const BULK_CALL: &str = "wm_bulkCall";

    /// Permission introspection and update
    pub const GET_PERMISSIONS: &str = "wm_getPermissions";
    pub const UPDATE_PERMISSIONS: &str = "wm_updatePermissions";

    /// Per-wallet method discovery
    pub const GET_SUPPORTED_METHODS: &str = "wm_getSupportedMethods";
}

/// Router-emitted notification names
pub mod notifications {
    /// A session was established
    pub const CONNECTED: &str = "wm_connected";
    /// A session was torn down
    pub const DISCONNECTED: &str = "wm_disconnected";
    /// A session's granted permissions changed
    pub const PERMISSIONS_CHANGED: &str = "wm_permissionsChanged";
    /// A wallet reported a state change
    pub const WALLET_STATE_CHANGED: &str = "wm_walletStateChanged";
}

/// Wire error codes
///
/// Standard JSON-RPC 2.0 codes plus the router-specific range. The normative
/// error names live in [`crate::error::WmError::name`].
pub mod error_codes {
    /// Invalid Request - The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i64 = -32600;

    /// Method not found - The method does not exist / is not available
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Internal error - Internal JSON-RPC error
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Unknown, expired, or origin-mismatched session
    pub const INVALID_SESSION: i64 = -32001;

    /// Chain id not present in the wallet registry
    pub const UNKNOWN_CHAIN: i64 = -32002;

    /// Inner method not registered on the target wallet
    pub const METHOD_NOT_SUPPORTED: i64 = -32003;

    /// Wallet transport failed or was removed mid-call
    pub const WALLET_NOT_AVAILABLE: i64 = -32004;

    /// Permission denied, user denial, or approval timeout
    pub const INSUFFICIENT_PERMISSIONS: i64 = -32005;

    /// Approval queue already holds this outer request id
    pub const DUPLICATE_REQUEST_ID: i64 = -32006;

    /// Outbound request exceeded its deadline
    pub const TIMEOUT: i64 = -32007;

    /// Transport-level failure
    pub const TRANSPORT_ERROR: i64 = -32008;
}

/// Default configuration values
pub mod defaults {
    /// Default outbound request timeout in milliseconds
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Default approval-queue timeout in milliseconds (5 minutes)
    pub const APPROVAL_TIMEOUT_MS: u64 = 300_000;

    /// Origin recorded when the transport does not supply one
    pub const UNKNOWN_ORIGIN: &str = "unknown";
}

/// Environment variable names honored by the config constructors
pub mod env {
    /// Overrides the session lifetime in milliseconds
    pub const SESSION_LIFETIME_MS: &str = "WM_SESSION_LIFETIME_MS";

    /// Overrides the approval-queue timeout in milliseconds
    pub const APPROVAL_TIMEOUT_MS: &str = "WM_APPROVAL_TIMEOUT_MS";
}
