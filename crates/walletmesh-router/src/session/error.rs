//! Session Store Errors
//!
//! Every failure here maps fail-closed to `invalidSession` at the wire;
//! storage faults are additionally logged as internal by the caller.

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::error::WmError;

/// Session store error types
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// No session with this id, or it has expired and been reclaimed
    #[error("session {id} not found")]
    NotFound {
        /// The unknown session id
        id: String,
    },

    /// The session exists but has passed its lifetime
    #[error("session {id} expired")]
    Expired {
        /// The expired session id
        id: String,
    },

    /// The caller's origin does not match the one recorded at creation
    #[error("session {id} does not belong to this origin")]
    OriginMismatch {
        /// The session id the caller presented
        id: String,
    },

    /// Durable backend fault
    #[error("session storage error: {message}")]
    Storage {
        /// Underlying backend failure, stringified
        message: String,
    },
}

impl SessionError {
    /// Shorthand constructor for [`SessionError::Storage`]
    pub fn storage(message: impl Into<String>) -> Self {
        SessionError::Storage {
            message: message.into(),
        }
    }
}

/// Convenient result alias for store operations
pub type SessionResult<T> = Result<T, SessionError>;

impl From<SessionError> for WmError {
    fn from(error: SessionError) -> Self {
        WmError::InvalidSession {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_session_error_maps_to_invalid_session() {
        let errors = [
            SessionError::NotFound { id: "a".into() },
            SessionError::Expired { id: "a".into() },
            SessionError::OriginMismatch { id: "a".into() },
            SessionError::storage("disk gone"),
        ];
        for error in errors {
            assert!(matches!(
                WmError::from(error),
                WmError::InvalidSession { .. }
            ));
        }
    }
}
