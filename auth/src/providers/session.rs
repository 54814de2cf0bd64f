//! Session store trait.

use crate::error::Result;
use crate::state::{AccountId, Session, SessionId, TokenFingerprint};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Session store.
///
/// Persists one row per issued token, keyed by the token fingerprint.
///
/// # Implementation Notes
///
/// - Rows are never reactivated once revoked
/// - Revocation must be visible to subsequent reads
/// - Expired rows may linger until [`SessionStore::delete_expired`] runs
pub trait SessionStore: Send + Sync {
    /// Insert a new session row.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn insert(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    /// Find a session by token fingerprint, whatever its state.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn find_by_fingerprint(
        &self,
        fingerprint: &TokenFingerprint,
    ) -> impl Future<Output = Result<Option<Session>>> + Send;

    /// Update `last_activity_at`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn touch(
        &self,
        id: SessionId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Revoke one session. Returns `true` if an active row was revoked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn revoke(&self, id: SessionId) -> impl Future<Output = Result<bool>> + Send;

    /// Revoke the session of a token. Returns `true` if an active row was
    /// revoked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn revoke_by_fingerprint(
        &self,
        fingerprint: &TokenFingerprint,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Revoke every active session of an account. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn revoke_all(&self, account_id: AccountId) -> impl Future<Output = Result<u64>> + Send;

    /// Active, unexpired sessions of an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn list_active(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Session>>> + Send;

    /// Delete rows that expired before `before`. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn delete_expired(&self, before: DateTime<Utc>) -> impl Future<Output = Result<u64>> + Send;
}
