//! Session Types
//!
//! The session record, store configuration, and the expiry rule shared by
//! every backend.

// Layer 2: Third-party crate imports
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;

// Layer 3: Internal module imports
use crate::protocol::constants::env;
use crate::protocol::ChainPermissions;

/// An origin-bound session
///
/// Retrievable only by the origin that created it; granted permissions are
/// replaced atomically by `wm_updatePermissions`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    /// Unique identifier, 128 bits of entropy rendered as hex
    pub id: String,

    /// Originator recorded at creation; lookups from any other origin fail
    pub origin: String,

    /// Permissions granted to this session
    pub permissions: ChainPermissions,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last access timestamp; the expiry clock measures from here
    pub last_access_at: DateTime<Utc>,

    /// Expiry interval in milliseconds; `None` means non-expiring
    pub lifetime_ms: Option<u64>,
}

impl SessionData {
    /// Build a fresh session for the given origin
    pub fn new(origin: &str, permissions: ChainPermissions, lifetime_ms: Option<u64>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_session_id(),
            origin: origin.to_string(),
            permissions,
            created_at: now,
            last_access_at: now,
            lifetime_ms,
        }
    }

    /// Whether the session has passed its lifetime at `now`
    ///
    /// A session is expired iff it has a lifetime and at least that much
    /// time has elapsed since the last access.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.lifetime_ms {
            None => false,
            Some(lifetime_ms) => {
                let elapsed = now.signed_duration_since(self.last_access_at);
                elapsed >= ChronoDuration::milliseconds(lifetime_ms as i64)
            }
        }
    }

    /// Whether the session has passed its lifetime right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Store configuration shared by all backends
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Lifetime applied to new sessions; `None` means non-expiring
    pub lifetime_ms: Option<u64>,

    /// Whether reads through `validate_and_refresh` bump `last_access_at`
    pub refresh_on_access: bool,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            lifetime_ms: None,
            refresh_on_access: true,
        }
    }
}

impl SessionStoreConfig {
    /// Defaults, with `WM_SESSION_LIFETIME_MS` honored when set
    pub fn from_env() -> Self {
        let lifetime_ms = std::env::var(env::SESSION_LIFETIME_MS)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok());
        Self {
            lifetime_ms,
            ..Self::default()
        }
    }
}

/// Generate a session id with 128 bits of entropy, hex-encoded
pub fn generate_session_id() -> String {
    let raw: u128 = rand::thread_rng().gen();
    format!("{raw:032x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn session_ids_are_long_and_unique() {
        let ids: HashSet<String> = (0..64).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 64);
        for id in &ids {
            assert_eq!(id.len(), 32);
        }
    }

    #[test]
    fn session_without_lifetime_never_expires() {
        let session = SessionData::new("origin", ChainPermissions::new(), None);
        let far_future = Utc::now() + ChronoDuration::days(365 * 100);
        assert!(!session.is_expired_at(far_future));
    }

    #[test]
    fn session_expires_at_its_lifetime_boundary() {
        let mut session = SessionData::new("origin", ChainPermissions::new(), Some(50));
        let start = session.last_access_at;
        assert!(!session.is_expired_at(start + ChronoDuration::milliseconds(49)));
        assert!(session.is_expired_at(start + ChronoDuration::milliseconds(50)));

        // Refreshing the access time pushes expiry out.
        session.last_access_at = start + ChronoDuration::milliseconds(40);
        assert!(!session.is_expired_at(start + ChronoDuration::milliseconds(80)));
    }
}
