//! Session Store
//!
//! Origin-bound session lifetime management behind a pluggable store trait.
//! Two backends ship with the crate: a trivial in-memory map and a durable
//! store over an abstract key-value interface with versioned records.
//!
//! Every operation that returns or mutates a session verifies the caller's
//! origin against the one recorded at creation; mismatches and expiry both
//! surface as [`SessionError`] values that map to `invalidSession` on the
//! wire.

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use crate::protocol::ChainPermissions;

pub mod durable;
pub mod error;
pub mod memory;
pub mod types;

pub use durable::{DurableSessionStore, KeyValueStore, MemoryKeyValueStore};
pub use error::{SessionError, SessionResult};
pub use memory::InMemorySessionStore;
pub use types::{generate_session_id, SessionData, SessionStoreConfig};

/// Pluggable session store contract
///
/// Expired entries are invisible to `get` and `validate_and_refresh` and may
/// be reclaimed lazily; `clean_expired` exists for eager reclamation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session for `origin` with the given granted permissions
    async fn create(
        &self,
        origin: &str,
        permissions: ChainPermissions,
    ) -> SessionResult<SessionData>;

    /// Fetch a session, enforcing origin binding and expiry
    async fn get(&self, session_id: &str, origin: &str) -> SessionResult<SessionData>;

    /// Fetch a session and, when configured, bump its last-access time
    async fn validate_and_refresh(
        &self,
        session_id: &str,
        origin: &str,
    ) -> SessionResult<SessionData>;

    /// Atomically replace a session's granted permissions
    async fn update_permissions(
        &self,
        session_id: &str,
        origin: &str,
        permissions: ChainPermissions,
    ) -> SessionResult<()>;

    /// Delete a session; deleting an absent id is not an error
    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    /// All non-expired sessions
    async fn get_all(&self) -> SessionResult<Vec<SessionData>>;

    /// Eagerly remove expired entries, returning how many were reclaimed
    async fn clean_expired(&self) -> SessionResult<usize>;

    /// Remove every session
    async fn clear(&self) -> SessionResult<()>;
}
