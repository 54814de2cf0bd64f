//! Account store trait.

use crate::error::Result;
use crate::state::{Account, AccountId, NewAccount};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Account store.
///
/// Reads and writes rows of the `accounts` table. Emails passed in are
/// already normalized.
pub trait AccountStore: Send + Sync {
    /// Find an account by normalized email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn find_by_email(&self, email: &str) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// Find an account by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn find_by_id(&self, id: AccountId) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The email is already registered → `AuthError::EmailTaken`
    /// - The store cannot be reached
    fn insert(&self, account: &NewAccount) -> impl Future<Output = Result<Account>> + Send;

    /// Replace the stored password hash.
    ///
    /// Returns `false` if no such account exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Activate or deactivate an account.
    ///
    /// Returns `false` if no such account exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn set_active(&self, id: AccountId, active: bool) -> impl Future<Output = Result<bool>> + Send;

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn record_login(
        &self,
        id: AccountId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}
