//! Server-side session registry.
//!
//! A signed token alone cannot be revoked before it expires. Every issued
//! token is therefore paired with a session row keyed by the token's
//! fingerprint; a token is honoured only while its row is active and
//! unexpired.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::error::Result;
use crate::providers::{Clock, SessionStore};
use crate::state::{
    AccountId, DeviceMeta, Session, SessionId, SessionStatus, TokenFingerprint, TokenKind,
};
use crate::tokens::IssuedToken;
use crate::utils::with_timeout;

/// Session registry over a [`SessionStore`].
#[derive(Clone)]
pub struct SessionRegistry<S> {
    store: S,
    clock: Arc<dyn Clock>,
    store_timeout: std::time::Duration,
    touch_interval: Duration,
    leeway: Duration,
}

impl<S> SessionRegistry<S>
where
    S: SessionStore + Clone + 'static,
{
    /// Create a registry.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        store_timeout: std::time::Duration,
        touch_interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            store_timeout,
            touch_interval,
            leeway: Duration::zero(),
        }
    }

    /// Clock-skew allowance past a session's expiry, matching the token
    /// verification leeway.
    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Record a new session that starts now and lasts `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn create(
        &self,
        account_id: AccountId,
        fingerprint: TokenFingerprint,
        kind: TokenKind,
        ttl: Duration,
        device: DeviceMeta,
    ) -> Result<SessionId> {
        let now = self.clock.now();
        self.insert(account_id, fingerprint, kind, now, now + ttl, device)
            .await
    }

    /// Record the session of a freshly issued token. The row carries the
    /// token's own issue and expiry times.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn register(
        &self,
        account_id: AccountId,
        token: &IssuedToken,
        device: DeviceMeta,
    ) -> Result<SessionId> {
        self.insert(
            account_id,
            token.fingerprint.clone(),
            token.kind,
            token.issued_at,
            token.expires_at,
            device,
        )
        .await
    }

    async fn insert(
        &self,
        account_id: AccountId,
        fingerprint: TokenFingerprint,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        device: DeviceMeta,
    ) -> Result<SessionId> {
        let session = Session {
            id: SessionId::new(),
            account_id,
            fingerprint,
            kind,
            issued_at,
            expires_at,
            last_activity_at: self.clock.now(),
            device,
            is_active: true,
        };

        with_timeout(self.store_timeout, "session.insert", self.store.insert(&session)).await?;

        tracing::debug!(
            session_id = %session.id,
            account_id = %account_id,
            kind = kind.as_str(),
            fingerprint = session.fingerprint.short(),
            "Session created"
        );
        Ok(session.id)
    }

    /// State of the session behind `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn lookup(&self, fingerprint: &TokenFingerprint) -> Result<SessionStatus> {
        let row = with_timeout(
            self.store_timeout,
            "session.find",
            self.store.find_by_fingerprint(fingerprint),
        )
        .await?;
        // Expiry is judged with the same leeway as the token itself.
        Ok(SessionStatus::classify(row, self.clock.now() - self.leeway))
    }

    /// Returns `true` if the session behind `fingerprint` is active and
    /// unexpired.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn is_active(&self, fingerprint: &TokenFingerprint) -> Result<bool> {
        Ok(self.lookup(fingerprint).await?.is_active())
    }

    /// Update the session's activity time in the background.
    ///
    /// Skipped when the last recorded activity is recent. Failures are
    /// logged and otherwise ignored.
    pub fn touch(&self, session: &Session) {
        let now = self.clock.now();
        if now - session.last_activity_at < self.touch_interval {
            return;
        }

        let store = self.store.clone();
        let limit = self.store_timeout;
        let id = session.id;
        tokio::spawn(async move {
            if let Err(e) = with_timeout(limit, "session.touch", store.touch(id, now)).await {
                tracing::debug!(session_id = %id, error = %e, "Session touch dropped");
            }
        });
    }

    /// Revoke one session.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn revoke(&self, id: SessionId) -> Result<bool> {
        let revoked = with_timeout(self.store_timeout, "session.revoke", self.store.revoke(id)).await?;
        tracing::info!(session_id = %id, revoked, "Session revoked");
        Ok(revoked)
    }

    /// Revoke the session of a token.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn revoke_fingerprint(&self, fingerprint: &TokenFingerprint) -> Result<bool> {
        let revoked = with_timeout(
            self.store_timeout,
            "session.revoke_fingerprint",
            self.store.revoke_by_fingerprint(fingerprint),
        )
        .await?;
        tracing::info!(fingerprint = fingerprint.short(), revoked, "Session revoked");
        Ok(revoked)
    }

    /// Revoke every session of an account.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn revoke_all(&self, account_id: AccountId) -> Result<u64> {
        let count = with_timeout(
            self.store_timeout,
            "session.revoke_all",
            self.store.revoke_all(account_id),
        )
        .await?;
        tracing::info!(account_id = %account_id, count, "All sessions revoked");
        Ok(count)
    }

    /// Active sessions of an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn active_sessions(&self, account_id: AccountId) -> Result<Vec<Session>> {
        with_timeout(
            self.store_timeout,
            "session.list_active",
            self.store.list_active(account_id, self.clock.now()),
        )
        .await
    }

    /// Delete expired rows.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn purge_expired(&self) -> Result<u64> {
        let count = with_timeout(
            self.store_timeout,
            "session.delete_expired",
            self.store.delete_expired(self.clock.now()),
        )
        .await?;
        tracing::info!(count, "Expired sessions purged");
        Ok(count)
    }
}
