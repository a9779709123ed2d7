//! Durable Session Store
//!
//! Persists each session as one record under a namespaced key in an
//! abstract [`KeyValueStore`]. Records carry a format version for forward
//! migration; undecodable or unknown-version blobs are logged, skipped, and
//! purged by `clean_expired`. Writes are atomic per session because one
//! session is one key.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::error::{SessionError, SessionResult};
use super::types::{SessionData, SessionStoreConfig};
use super::SessionStore;
use crate::protocol::ChainPermissions;

/// Key prefix for persisted session records
pub const KEY_PREFIX: &str = "wm:session:";

/// Current record format version
pub const RECORD_VERSION: u32 = 1;

/// Minimal key-value persistence contract
///
/// Implementations must make single-key writes atomic; the store never
/// needs cross-key transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one
    async fn put(&self, key: &str, value: Vec<u8>) -> SessionResult<()>;

    /// Delete a key; absent keys are not an error
    async fn delete(&self, key: &str) -> SessionResult<()>;

    /// All keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> SessionResult<Vec<String>>;
}

/// Map-backed key-value store, for tests and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> SessionResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> SessionResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> SessionResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

/// Versioned on-disk form of a session
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    version: u32,
    id: String,
    origin: String,
    permissions: ChainPermissions,
    created_at_ms: i64,
    last_access_at_ms: i64,
    lifetime_ms: Option<u64>,
}

impl SessionRecord {
    fn from_session(session: &SessionData) -> Self {
        Self {
            version: RECORD_VERSION,
            id: session.id.clone(),
            origin: session.origin.clone(),
            permissions: session.permissions.clone(),
            created_at_ms: session.created_at.timestamp_millis(),
            last_access_at_ms: session.last_access_at.timestamp_millis(),
            lifetime_ms: session.lifetime_ms,
        }
    }

    fn into_session(self) -> Option<SessionData> {
        Some(SessionData {
            id: self.id,
            origin: self.origin,
            permissions: self.permissions,
            created_at: millis_to_datetime(self.created_at_ms)?,
            last_access_at: millis_to_datetime(self.last_access_at_ms)?,
            lifetime_ms: self.lifetime_ms,
        })
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Session store persisting through a [`KeyValueStore`]
pub struct DurableSessionStore {
    kv: Arc<dyn KeyValueStore>,
    config: SessionStoreConfig,
}

impl DurableSessionStore {
    /// Create a store over the given backend
    pub fn new(kv: Arc<dyn KeyValueStore>, config: SessionStoreConfig) -> Self {
        Self { kv, config }
    }

    fn key_for(session_id: &str) -> String {
        format!("{KEY_PREFIX}{session_id}")
    }

    async fn write(&self, session: &SessionData) -> SessionResult<()> {
        let record = SessionRecord::from_session(session);
        let bytes = serde_json::to_vec(&record)
            .map_err(|error| SessionError::storage(error.to_string()))?;
        self.kv.put(&Self::key_for(&session.id), bytes).await
    }

    /// Decode a stored blob; `None` means corrupt or unreadable
    fn decode(key: &str, bytes: &[u8]) -> Option<SessionData> {
        let record: SessionRecord = match serde_json::from_slice(bytes) {
            Ok(record) => record,
            Err(error) => {
                warn!(key, %error, "corrupt session record skipped");
                return None;
            }
        };
        if record.version != RECORD_VERSION {
            warn!(key, version = record.version, "unknown session record version skipped");
            return None;
        }
        let decoded = record.into_session();
        if decoded.is_none() {
            warn!(key, "session record with out-of-range timestamps skipped");
        }
        decoded
    }

    /// Load a live session, purging it when expired
    async fn load_live(&self, session_id: &str) -> SessionResult<SessionData> {
        let key = Self::key_for(session_id);
        let Some(bytes) = self.kv.get(&key).await? else {
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        };
        let Some(session) = Self::decode(&key, &bytes) else {
            // Fail closed on a blob this process cannot understand.
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        };
        if session.is_expired() {
            self.kv.delete(&key).await?;
            debug!(session_id, "expired session purged on access");
            return Err(SessionError::Expired {
                id: session_id.to_string(),
            });
        }
        Ok(session)
    }

    fn check_origin(session: &SessionData, origin: &str) -> SessionResult<()> {
        if session.origin != origin {
            return Err(SessionError::OriginMismatch {
                id: session.id.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for DurableSessionStore {
    async fn create(
        &self,
        origin: &str,
        permissions: ChainPermissions,
    ) -> SessionResult<SessionData> {
        let session = SessionData::new(origin, permissions, self.config.lifetime_ms);
        self.write(&session).await?;
        Ok(session)
    }

    async fn get(&self, session_id: &str, origin: &str) -> SessionResult<SessionData> {
        let session = self.load_live(session_id).await?;
        Self::check_origin(&session, origin)?;
        Ok(session)
    }

    async fn validate_and_refresh(
        &self,
        session_id: &str,
        origin: &str,
    ) -> SessionResult<SessionData> {
        let mut session = self.load_live(session_id).await?;
        Self::check_origin(&session, origin)?;
        if self.config.refresh_on_access {
            session.last_access_at = Utc::now();
            self.write(&session).await?;
        }
        Ok(session)
    }

    async fn update_permissions(
        &self,
        session_id: &str,
        origin: &str,
        permissions: ChainPermissions,
    ) -> SessionResult<()> {
        let mut session = self.load_live(session_id).await?;
        Self::check_origin(&session, origin)?;
        session.permissions = permissions;
        self.write(&session).await
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        self.kv.delete(&Self::key_for(session_id)).await
    }

    async fn get_all(&self) -> SessionResult<Vec<SessionData>> {
        let now = Utc::now();
        let mut sessions = Vec::new();
        for key in self.kv.keys(KEY_PREFIX).await? {
            let Some(bytes) = self.kv.get(&key).await? else {
                continue;
            };
            if let Some(session) = Self::decode(&key, &bytes) {
                if !session.is_expired_at(now) {
                    sessions.push(session);
                }
            }
        }
        Ok(sessions)
    }

    async fn clean_expired(&self) -> SessionResult<usize> {
        let now = Utc::now();
        let mut reclaimed = 0;
        for key in self.kv.keys(KEY_PREFIX).await? {
            let Some(bytes) = self.kv.get(&key).await? else {
                continue;
            };
            match Self::decode(&key, &bytes) {
                Some(session) if session.is_expired_at(now) => {
                    self.kv.delete(&key).await?;
                    reclaimed += 1;
                }
                Some(_) => {}
                // Corrupt blobs are purged but not counted as expired.
                None => self.kv.delete(&key).await?,
            }
        }
        Ok(reclaimed)
    }

    async fn clear(&self) -> SessionResult<()> {
        for key in self.kv.keys(KEY_PREFIX).await? {
            self.kv.delete(&key).await?;
        }
        Ok(())
    }
}
