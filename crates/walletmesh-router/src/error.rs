//! Unified Error Taxonomy
//!
//! Every failure the router surfaces to a caller is a [`WmError`]. The enum
//! mirrors the normative error names of the meta-protocol; [`WmError::name`]
//! yields the wire name, [`WmError::code`] the numeric code, and
//! [`WmError::to_error_object`] the JSON-RPC error object carried in
//! responses. Errors received off the wire are classified back into the
//! taxonomy by [`WmError::from_error_object`], so a provider sees the same
//! kinds the router produced.
//!
//! Wallet-side errors that match no known name forward verbatim as
//! [`WmError::Wallet`], preserving code, message, and data.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::{json, Value};
use thiserror::Error;

// Layer 3: Internal module imports
use crate::protocol::constants::error_codes;
use crate::protocol::message::RpcErrorObject;

/// Unified router error
///
/// Clone-able so a single failure can complete several pending requests
/// (wallet removal, shutdown).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WmError {
    /// Malformed params, or an unexpected session id on connect
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request
        message: String,
    },

    /// No handler registered for the requested method
    #[error("method not found: {method}")]
    MethodNotFound {
        /// The unknown method name
        method: String,
    },

    /// Unknown, expired, or origin-mismatched session
    #[error("invalid session: {message}")]
    InvalidSession {
        /// Why the session was rejected
        message: String,
    },

    /// Chain id not present in the wallet registry
    #[error("unknown chain: {chain_id}")]
    UnknownChain {
        /// The chain id that had no wallet
        chain_id: String,
    },

    /// Inner method not registered on the target wallet
    #[error("method not supported: {method}")]
    MethodNotSupported {
        /// The unsupported inner method
        method: String,
    },

    /// Wallet transport failed or the wallet was removed mid-call
    #[error("wallet not available: {chain_id}")]
    WalletNotAvailable {
        /// The chain whose wallet is gone
        chain_id: String,
    },

    /// Permission denied by policy, by the user, or by approval timeout
    #[error("insufficient permissions: {reason}")]
    InsufficientPermissions {
        /// "denied" or "timeout"
        reason: String,
    },

    /// The approval queue already holds this outer request id
    #[error("duplicate request id: {id}")]
    DuplicateRequestId {
        /// The duplicated outer id, rendered as text
        id: String,
    },

    /// An outbound request exceeded its deadline
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that elapsed
        timeout_ms: u64,
    },

    /// Transport-level failure
    #[error("transport error: {message}")]
    Transport {
        /// Underlying transport failure, stringified
        message: String,
    },

    /// Internal fault; logged, never expected in normal operation
    #[error("internal error: {message}")]
    Internal {
        /// Description of the fault
        message: String,
    },

    /// Error forwarded verbatim from a wallet backend
    #[error("wallet error {code}: {message}")]
    Wallet {
        /// Wallet-side error code, preserved
        code: i64,
        /// Wallet-side message, preserved
        message: String,
        /// Wallet-side data, preserved
        data: Option<Value>,
    },
}

/// Convenient result alias used throughout the crate
pub type WmResult<T> = Result<T, WmError>;

impl WmError {
    /// Normative wire name of this error kind
    pub fn name(&self) -> &'static str {
        match self {
            WmError::InvalidRequest { .. } => "invalidRequest",
            WmError::MethodNotFound { .. } => "methodNotFound",
            WmError::InvalidSession { .. } => "invalidSession",
            WmError::UnknownChain { .. } => "unknownChain",
            WmError::MethodNotSupported { .. } => "methodNotSupported",
            WmError::WalletNotAvailable { .. } => "walletNotAvailable",
            WmError::InsufficientPermissions { .. } => "insufficientPermissions",
            WmError::DuplicateRequestId { .. } => "duplicateRequestId",
            WmError::Timeout { .. } => "timeout",
            WmError::Transport { .. } => "transportError",
            WmError::Internal { .. } => "internal",
            WmError::Wallet { .. } => "walletError",
        }
    }

    /// Numeric wire code of this error kind
    pub fn code(&self) -> i64 {
        match self {
            WmError::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            WmError::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            WmError::InvalidSession { .. } => error_codes::INVALID_SESSION,
            WmError::UnknownChain { .. } => error_codes::UNKNOWN_CHAIN,
            WmError::MethodNotSupported { .. } => error_codes::METHOD_NOT_SUPPORTED,
            WmError::WalletNotAvailable { .. } => error_codes::WALLET_NOT_AVAILABLE,
            WmError::InsufficientPermissions { .. } => error_codes::INSUFFICIENT_PERMISSIONS,
            WmError::DuplicateRequestId { .. } => error_codes::DUPLICATE_REQUEST_ID,
            WmError::Timeout { .. } => error_codes::TIMEOUT,
            WmError::Transport { .. } => error_codes::TRANSPORT_ERROR,
            WmError::Internal { .. } => error_codes::INTERNAL_ERROR,
            WmError::Wallet { code, .. } => *code,
        }
    }

    /// Render this error as a JSON-RPC error object
    ///
    /// The normative name rides under `data.name`; denial and timeout of an
    /// approval are distinguished by `data.reason`. Wallet errors keep their
    /// original code, message, and data untouched.
    pub fn to_error_object(&self) -> RpcErrorObject {
        if let WmError::Wallet { code, message, data } = self {
            return RpcErrorObject::new(*code, message.clone(), data.clone());
        }
        let data = match self {
            WmError::InsufficientPermissions { reason } => {
                Some(json!({ "name": self.name(), "reason": reason }))
            }
            _ => Some(json!({ "name": self.name() })),
        };
        RpcErrorObject::new(self.code(), self.to_string(), data)
    }

    /// Classify a wire error object back into the taxonomy
    ///
    /// Objects carrying a known `data.name` are reconstructed as that kind; a
    /// bare `-32601` maps to [`WmError::MethodNotFound`]; everything else
    /// forwards verbatim as [`WmError::Wallet`].
    pub fn from_error_object(object: &RpcErrorObject) -> WmError {
        let name = object
            .data
            .as_ref()
            .and_then(|data| data.get("name"))
            .and_then(Value::as_str);
        let reason = object
            .data
            .as_ref()
            .and_then(|data| data.get("reason"))
            .and_then(Value::as_str)
            .unwrap_or("denied");

        match name {
            Some("invalidRequest") => WmError::InvalidRequest {
                message: object.message.clone(),
            },
            Some("methodNotFound") => WmError::MethodNotFound {
                method: object.message.clone(),
            },
            Some("invalidSession") => WmError::InvalidSession {
                message: object.message.clone(),
            },
            Some("unknownChain") => WmError::UnknownChain {
                chain_id: object.message.clone(),
            },
            Some("methodNotSupported") => WmError::MethodNotSupported {
                method: object.message.clone(),
            },
            Some("walletNotAvailable") => WmError::WalletNotAvailable {
                chain_id: object.message.clone(),
            },
            Some("insufficientPermissions") => WmError::InsufficientPermissions {
                reason: reason.to_string(),
            },
            Some("duplicateRequestId") => WmError::DuplicateRequestId {
                id: object.message.clone(),
            },
            Some("timeout") => WmError::Timeout { timeout_ms: 0 },
            Some("transportError") => WmError::Transport {
                message: object.message.clone(),
            },
            Some("internal") => WmError::Internal {
                message: object.message.clone(),
            },
            None if object.code == error_codes::METHOD_NOT_FOUND => WmError::MethodNotFound {
                method: object.message.clone(),
            },
            _ => WmError::Wallet {
                code: object.code,
                message: object.message.clone(),
                data: object.data.clone(),
            },
        }
    }

    /// Shorthand constructor for [`WmError::InvalidRequest`]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        WmError::InvalidRequest {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`WmError::InvalidSession`]
    pub fn invalid_session(message: impl Into<String>) -> Self {
        WmError::InvalidSession {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`WmError::InsufficientPermissions`]
    pub fn insufficient_permissions(reason: impl Into<String>) -> Self {
        WmError::InsufficientPermissions {
            reason: reason.into(),
        }
    }

    /// Shorthand constructor for [`WmError::Internal`]
    pub fn internal(message: impl Into<String>) -> Self {
        WmError::Internal {
            message: message.into(),
        }
    }

    /// Shorthand constructor for [`WmError::Transport`]
    pub fn transport(message: impl Into<String>) -> Self {
        WmError::Transport {
            message: message.into(),
        }
    }
}

impl From<crate::protocol::transport::TransportError> for WmError {
    fn from(error: crate::protocol::transport::TransportError) -> Self {
        WmError::Transport {
            message: error.to_string(),
        }
    }
}
