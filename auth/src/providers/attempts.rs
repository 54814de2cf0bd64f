//! Login attempt store trait.

use crate::config::ThrottlePolicy;
use crate::error::Result;
use crate::state::AttemptRecord;
use chrono::{DateTime, Utc};
use std::future::Future;

/// Persistent failure counters for the login throttle.
///
/// # Atomicity
///
/// [`AttemptStore::increment_failure`] must be a single atomic operation:
/// two concurrent failures for the same key must both be counted. A
/// read-then-write in application code does not satisfy this.
pub trait AttemptStore: Send + Sync {
    /// Count one failure for `key` and apply `policy`.
    ///
    /// In one atomic step:
    /// - if there is no record, or its window has elapsed, or its lock has
    ///   elapsed, start a new window with a count of 1
    /// - otherwise increment the count
    /// - keep an active lock, or lock until `now + policy.lockout` once the
    ///   count reaches `policy.max_failures`
    ///
    /// Returns the record after the update.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn increment_failure(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &ThrottlePolicy,
    ) -> impl Future<Output = Result<AttemptRecord>> + Send;

    /// Current record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<AttemptRecord>>> + Send;

    /// Clear the counter and any lock for `key`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn reset(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Delete records that no longer affect any decision: no lock active
    /// at `now`, and a window that started at or before `window_cutoff`.
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreUnavailable` if the store cannot be reached.
    fn delete_stale(
        &self,
        now: DateTime<Utc>,
        window_cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64>> + Send;
}
