//! Mock account store for testing.

use super::{lock_failed, unavailable};
use crate::error::{AuthError, Result};
use crate::providers::AccountStore;
use crate::state::{Account, AccountId, NewAccount};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mock account store.
///
/// Uses in-memory storage for testing.
#[derive(Debug, Clone, Default)]
pub struct MockAccountStore {
    accounts: Arc<Mutex<HashMap<AccountId, Account>>>,
    offline: Arc<AtomicBool>,
}

impl MockAccountStore {
    /// Create a new mock account store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of one account (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn get(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.lock().map_err(|_| lock_failed())?.get(&id).cloned())
    }

    /// Overwrite a row directly, bypassing validation (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn put(&self, account: Account) -> Result<()> {
        self.accounts
            .lock()
            .map_err(|_| lock_failed())?
            .insert(account.id, account);
        Ok(())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

impl AccountStore for MockAccountStore {
    fn find_by_email(&self, email: &str) -> impl Future<Output = Result<Option<Account>>> + Send {
        let store = self.clone();
        let email = email.to_string();

        async move {
            store.check_online()?;
            let accounts = store.accounts.lock().map_err(|_| lock_failed())?;
            Ok(accounts.values().find(|a| a.email == email).cloned())
        }
    }

    fn find_by_id(&self, id: AccountId) -> impl Future<Output = Result<Option<Account>>> + Send {
        let store = self.clone();

        async move {
            store.check_online()?;
            Ok(store.accounts.lock().map_err(|_| lock_failed())?.get(&id).cloned())
        }
    }

    fn insert(&self, account: &NewAccount) -> impl Future<Output = Result<Account>> + Send {
        let store = self.clone();
        let new = account.clone();

        async move {
            store.check_online()?;
            let mut accounts = store.accounts.lock().map_err(|_| lock_failed())?;

            if accounts.values().any(|a| a.email == new.email) {
                return Err(AuthError::EmailTaken);
            }

            let account = Account {
                id: AccountId::new(),
                email: new.email,
                password_hash: new.password_hash,
                display_name: new.display_name,
                role: new.role,
                assigned_event_id: new.assigned_event_id,
                is_active: true,
                created_at: Utc::now(),
                last_login_at: None,
            };
            accounts.insert(account.id, account.clone());
            Ok(account)
        }
    }

    fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> impl Future<Output = Result<bool>> + Send {
        let store = self.clone();
        let password_hash = password_hash.to_string();

        async move {
            store.check_online()?;
            let mut accounts = store.accounts.lock().map_err(|_| lock_failed())?;
            Ok(accounts
                .get_mut(&id)
                .map(|a| a.password_hash = password_hash)
                .is_some())
        }
    }

    fn set_active(&self, id: AccountId, active: bool) -> impl Future<Output = Result<bool>> + Send {
        let store = self.clone();

        async move {
            store.check_online()?;
            let mut accounts = store.accounts.lock().map_err(|_| lock_failed())?;
            Ok(accounts.get_mut(&id).map(|a| a.is_active = active).is_some())
        }
    }

    fn record_login(
        &self,
        id: AccountId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        let store = self.clone();

        async move {
            store.check_online()?;
            let mut accounts = store.accounts.lock().map_err(|_| lock_failed())?;
            if let Some(account) = accounts.get_mut(&id) {
                account.last_login_at = Some(at);
            }
            Ok(())
        }
    }
}
