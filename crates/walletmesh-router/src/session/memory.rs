//! In-Memory Session Store
//!
//! The default backend: a concurrent map, gone on restart.

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

// Layer 3: Internal module imports
use super::error::{SessionError, SessionResult};
use super::types::{SessionData, SessionStoreConfig};
use super::SessionStore;
use crate::protocol::ChainPermissions;

/// Map-backed session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionData>,
    config: SessionStoreConfig,
}

impl InMemorySessionStore {
    /// Create a store with the given configuration
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Look up an entry, reclaiming it lazily when expired
    fn live_entry(&self, session_id: &str, origin: &str) -> SessionResult<SessionData> {
        {
            let Some(entry) = self.sessions.get(session_id) else {
                return Err(SessionError::NotFound {
                    id: session_id.to_string(),
                });
            };
            if !entry.is_expired() {
                if entry.origin != origin {
                    return Err(SessionError::OriginMismatch {
                        id: session_id.to_string(),
                    });
                }
                return Ok(entry.value().clone());
            }
        }
        // The map guard is released before the reclaim.
        self.sessions.remove(session_id);
        debug!(session_id, "expired session reclaimed on access");
        Err(SessionError::Expired {
            id: session_id.to_string(),
        })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        origin: &str,
        permissions: ChainPermissions,
    ) -> SessionResult<SessionData> {
        let session = SessionData::new(origin, permissions, self.config.lifetime_ms);
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: &str, origin: &str) -> SessionResult<SessionData> {
        self.live_entry(session_id, origin)
    }

    async fn validate_and_refresh(
        &self,
        session_id: &str,
        origin: &str,
    ) -> SessionResult<SessionData> {
        let mut session = self.live_entry(session_id, origin)?;
        if self.config.refresh_on_access {
            session.last_access_at = Utc::now();
            if let Some(mut entry) = self.sessions.get_mut(session_id) {
                entry.last_access_at = session.last_access_at;
            }
        }
        Ok(session)
    }

    async fn update_permissions(
        &self,
        session_id: &str,
        origin: &str,
        permissions: ChainPermissions,
    ) -> SessionResult<()> {
        self.live_entry(session_id, origin)?;
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.permissions = permissions;
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn get_all(&self) -> SessionResult<Vec<SessionData>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn clean_expired(&self) -> SessionResult<usize> {
        let now = Utc::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();
        let count = expired.len();
        for id in expired {
            self.sessions.remove(&id);
        }
        Ok(count)
    }

    async fn clear(&self) -> SessionResult<()> {
        self.sessions.clear();
        Ok(())
    }
}
