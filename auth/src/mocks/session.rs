//! Mock session store for testing.

use super::{lock_failed, unavailable};
use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{AccountId, Session, SessionId, TokenFingerprint};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mock session store.
///
/// Uses in-memory storage for testing.
#[derive(Debug, Clone, Default)]
pub struct MockSessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
    offline: Arc<AtomicBool>,
    latency: Arc<Mutex<Option<std::time::Duration>>>,
}

impl MockSessionStore {
    /// Create a new mock session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every call, to exercise timeouts.
    pub fn set_latency(&self, latency: Option<std::time::Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Get count of stored sessions (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self.sessions.lock().map_err(|_| lock_failed())?.len())
    }

    /// Snapshot of one session (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn get(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.lock().map_err(|_| lock_failed())?.get(&id).cloned())
    }

    async fn enter(&self) -> Result<()> {
        let latency = *self.latency.lock().map_err(|_| lock_failed())?;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

impl SessionStore for MockSessionStore {
    fn insert(&self, session: &Session) -> impl Future<Output = Result<()>> + Send {
        let store = self.clone();
        let session = session.clone();

        async move {
            store.enter().await?;
            let mut sessions = store.sessions.lock().map_err(|_| lock_failed())?;

            if sessions.contains_key(&session.id)
                || sessions.values().any(|s| s.fingerprint == session.fingerprint)
            {
                return Err(AuthError::InternalError("Session already exists".to_string()));
            }

            sessions.insert(session.id, session);
            Ok(())
        }
    }

    fn find_by_fingerprint(
        &self,
        fingerprint: &TokenFingerprint,
    ) -> impl Future<Output = Result<Option<Session>>> + Send {
        let store = self.clone();
        let fingerprint = fingerprint.clone();

        async move {
            store.enter().await?;
            let sessions = store.sessions.lock().map_err(|_| lock_failed())?;
            Ok(sessions.values().find(|s| s.fingerprint == fingerprint).cloned())
        }
    }

    fn touch(&self, id: SessionId, at: DateTime<Utc>) -> impl Future<Output = Result<()>> + Send {
        let store = self.clone();

        async move {
            store.enter().await?;
            let mut sessions = store.sessions.lock().map_err(|_| lock_failed())?;
            if let Some(session) = sessions.get_mut(&id).filter(|s| s.is_active) {
                session.last_activity_at = session.last_activity_at.max(at);
            }
            Ok(())
        }
    }

    fn revoke(&self, id: SessionId) -> impl Future<Output = Result<bool>> + Send {
        let store = self.clone();

        async move {
            store.enter().await?;
            let mut sessions = store.sessions.lock().map_err(|_| lock_failed())?;
            Ok(sessions
                .get_mut(&id)
                .filter(|s| s.is_active)
                .map(|s| s.is_active = false)
                .is_some())
        }
    }

    fn revoke_by_fingerprint(
        &self,
        fingerprint: &TokenFingerprint,
    ) -> impl Future<Output = Result<bool>> + Send {
        let store = self.clone();
        let fingerprint = fingerprint.clone();

        async move {
            store.enter().await?;
            let mut sessions = store.sessions.lock().map_err(|_| lock_failed())?;
            Ok(sessions
                .values_mut()
                .find(|s| s.fingerprint == fingerprint && s.is_active)
                .map(|s| s.is_active = false)
                .is_some())
        }
    }

    fn revoke_all(&self, account_id: AccountId) -> impl Future<Output = Result<u64>> + Send {
        let store = self.clone();

        async move {
            store.enter().await?;
            let mut sessions = store.sessions.lock().map_err(|_| lock_failed())?;
            let mut count = 0;
            for session in sessions
                .values_mut()
                .filter(|s| s.account_id == account_id && s.is_active)
            {
                session.is_active = false;
                count += 1;
            }
            Ok(count)
        }
    }

    fn list_active(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Session>>> + Send {
        let store = self.clone();

        async move {
            store.enter().await?;
            let sessions = store.sessions.lock().map_err(|_| lock_failed())?;
            let mut active: Vec<Session> = sessions
                .values()
                .filter(|s| s.account_id == account_id && s.is_valid_at(now))
                .cloned()
                .collect();
            active.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
            Ok(active)
        }
    }

    fn delete_expired(&self, before: DateTime<Utc>) -> impl Future<Output = Result<u64>> + Send {
        let store = self.clone();

        async move {
            store.enter().await?;
            let mut sessions = store.sessions.lock().map_err(|_| lock_failed())?;
            let before_len = sessions.len();
            sessions.retain(|_, s| s.expires_at >= before);
            Ok((before_len - sessions.len()) as u64)
        }
    }
}
