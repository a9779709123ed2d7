//! Meta-Protocol Wire Types
//!
//! Chain identifiers, permission shapes, and the parameter/result structs of
//! every `wm_*` method. All wire structs use camelCase field names to match
//! the JSON-RPC surface that dApps see.

// Layer 1: Standard library imports
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque chain identifier in `namespace:reference` form
///
/// Examples: `eip155:1`, `solana:mainnet-beta`. The core compares chain ids
/// for equality only and never parses the inner structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Create a chain id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        ChainId(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        ChainId(value.to_string())
    }
}

impl From<String> for ChainId {
    fn from(value: String) -> Self {
        ChainId(value)
    }
}

/// Permissions as requested or granted: per chain, the set of callable methods
///
/// Ordered maps keep the serialized form deterministic, which the durable
/// session backend relies on.
pub type ChainPermissions = BTreeMap<ChainId, BTreeSet<String>>;

/// Wire form of a single permission entry as shown to dApps
///
/// Field names stay snake_case on the wire, matching the permission
/// projection the original protocol ships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDescriptor {
    /// Whether the method is currently callable
    pub allowed: bool,

    /// Short state label, e.g. "allow", "ask", "deny"
    pub short_desc: String,

    /// Optional longer explanation for UI display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_desc: Option<String>,
}

impl PermissionDescriptor {
    /// Create a descriptor with no long description
    pub fn new(allowed: bool, short_desc: impl Into<String>) -> Self {
        Self {
            allowed,
            short_desc: short_desc.into(),
            long_desc: None,
        }
    }
}

/// Human-readable permission projection returned to dApps
pub type HumanReadablePermissions = BTreeMap<ChainId, BTreeMap<String, PermissionDescriptor>>;

/// Collect the chains and methods marked `allowed` out of a projection
///
/// This is the granted set a session stores after `wm_connect` or
/// `wm_updatePermissions`.
pub fn granted_permissions(human: &HumanReadablePermissions) -> ChainPermissions {
    let mut granted = ChainPermissions::new();
    for (chain_id, methods) in human {
        let allowed: BTreeSet<String> = methods
            .iter()
            .filter(|(_, descriptor)| descriptor.allowed)
            .map(|(method, _)| method.clone())
            .collect();
        if !allowed.is_empty() {
            granted.insert(chain_id.clone(), allowed);
        }
    }
    granted
}

/// A single inner wallet call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Wallet-native method name
    pub method: String,

    /// Method parameters, passed through opaquely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl MethodCall {
    /// Create a call
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// `wm_connect` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Permissions the dApp is asking for
    pub permissions: ChainPermissions,

    /// Must be absent; connecting with a session id is an invalid request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// `wm_connect` result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    /// Fresh session identifier
    pub session_id: String,

    /// What was actually granted
    pub permissions: HumanReadablePermissions,
}

/// `wm_reconnect` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectParams {
    /// Session to re-bind
    pub session_id: String,
}

/// `wm_reconnect` result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectResult {
    /// Permissions currently granted to the session
    pub permissions: HumanReadablePermissions,
}

/// `wm_disconnect` parameters
///
/// The session id is attached by the provider; the session middleware has
/// already validated it by the time the handler runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectParams {
    /// Session to tear down
    pub session_id: String,
}

/// `wm_call` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParams {
    /// Target chain
    pub chain_id: ChainId,

    /// Originating session
    pub session_id: String,

    /// The inner wallet call
    pub call: MethodCall,
}

/// `wm_bulkCall` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCallParams {
    /// Target chain
    pub chain_id: ChainId,

    /// Originating session
    pub session_id: String,

    /// Inner calls, executed strictly in this order
    pub calls: Vec<MethodCall>,
}

/// `wm_getPermissions` parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPermissionsParams {
    /// Restrict the projection to these chains; `None` means all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_ids: Option<Vec<ChainId>>,

    /// Attached by the provider for session validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// `wm_updatePermissions` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionsParams {
    /// The requested replacement permission set
    pub permissions: ChainPermissions,

    /// Session whose grants are being updated
    pub session_id: String,
}

/// `wm_getSupportedMethods` parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSupportedMethodsParams {
    /// Restrict discovery to these chains; `None` means all registered wallets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_ids: Option<Vec<ChainId>>,
}

/// `wm_getSupportedMethods` result: per chain, the wallet's method list
pub type SupportedMethods = BTreeMap<ChainId, Vec<String>>;

/// `wm_walletStateChanged` notification payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStateChanged {
    /// Chain whose wallet reported the change
    pub chain_id: ChainId,

    /// The wallet event, payload mirrored verbatim under `data`
    pub changes: WalletStateChanges,
}

/// The mirrored wallet event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStateChanges {
    /// Wallet-side notification name, e.g. `chainChanged`
    pub event: String,

    /// Wallet-side payload, untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_id_is_transparent_on_the_wire() {
        let chain = ChainId::new("eip155:1");
        assert_eq!(serde_json::to_value(&chain).unwrap(), json!("eip155:1"));
        let parsed: ChainId = serde_json::from_value(json!("solana:mainnet-beta")).unwrap();
        assert_eq!(parsed.as_str(), "solana:mainnet-beta");
    }

    #[test]
    fn call_params_use_camel_case() {
        let params = CallParams {
            chain_id: ChainId::new("eip155:1"),
            session_id: "abc".to_string(),
            call: MethodCall::new("eth_accounts", None),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["chainId"], json!("eip155:1"));
        assert_eq!(value["sessionId"], json!("abc"));
        assert_eq!(value["call"]["method"], json!("eth_accounts"));
    }

    #[test]
    fn granted_permissions_keeps_only_allowed_entries() {
        let mut human = HumanReadablePermissions::new();
        let mut methods = BTreeMap::new();
        methods.insert(
            "eth_accounts".to_string(),
            PermissionDescriptor::new(true, "allow"),
        );
        methods.insert(
            "personal_sign".to_string(),
            PermissionDescriptor::new(false, "deny"),
        );
        human.insert(ChainId::new("eip155:1"), methods);

        let granted = granted_permissions(&human);
        let chain = granted.get(&ChainId::new("eip155:1")).unwrap();
        assert!(chain.contains("eth_accounts"));
        assert!(!chain.contains("personal_sign"));
    }

    #[test]
    fn granted_permissions_drops_fully_denied_chains() {
        let mut human = HumanReadablePermissions::new();
        let mut methods = BTreeMap::new();
        methods.insert(
            "personal_sign".to_string(),
            PermissionDescriptor::new(false, "deny"),
        );
        human.insert(ChainId::new("eip155:1"), methods);

        assert!(granted_permissions(&human).is_empty());
    }
}
