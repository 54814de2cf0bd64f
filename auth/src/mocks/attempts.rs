//! Mock login attempt store for testing.

use super::{lock_failed, unavailable};
use crate::config::ThrottlePolicy;
use crate::error::Result;
use crate::providers::AttemptStore;
use crate::state::AttemptRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mock attempt store.
///
/// The read, update and write of one failure happen inside a single
/// critical section, so concurrent failures are never lost.
#[derive(Debug, Clone, Default)]
pub struct MockAttemptStore {
    records: Arc<Mutex<HashMap<String, AttemptRecord>>>,
    offline: Arc<AtomicBool>,
}

impl MockAttemptStore {
    /// Create a new mock attempt store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn record_count(&self) -> Result<usize> {
        Ok(self.records.lock().map_err(|_| lock_failed())?.len())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

impl AttemptStore for MockAttemptStore {
    fn increment_failure(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &ThrottlePolicy,
    ) -> impl Future<Output = Result<AttemptRecord>> + Send {
        let store = self.clone();
        let key = key.to_string();
        let policy = *policy;

        async move {
            store.check_online()?;
            let mut records = store.records.lock().map_err(|_| lock_failed())?;
            let next = AttemptRecord::after_failure(records.get(&key), &key, now, &policy);
            records.insert(key, next.clone());
            Ok(next)
        }
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<AttemptRecord>>> + Send {
        let store = self.clone();
        let key = key.to_string();

        async move {
            store.check_online()?;
            Ok(store.records.lock().map_err(|_| lock_failed())?.get(&key).cloned())
        }
    }

    fn reset(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        let store = self.clone();
        let key = key.to_string();

        async move {
            store.check_online()?;
            store.records.lock().map_err(|_| lock_failed())?.remove(&key);
            Ok(())
        }
    }

    fn delete_stale(
        &self,
        now: DateTime<Utc>,
        window_cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64>> + Send {
        let store = self.clone();

        async move {
            store.check_online()?;
            let mut records = store.records.lock().map_err(|_| lock_failed())?;
            let before = records.len();
            records.retain(|_, record| {
                record.locked_until.is_some_and(|until| until > now)
                    || record.window_started_at > window_cutoff
            });
            Ok((before - records.len()) as u64)
        }
    }
}
