//! Login throttle.
//!
//! Counts failed logins per throttle key and locks a key for a cooldown
//! once it reaches the policy threshold within the counting window. Keys
//! are either per account (`account:<email>`, always on) or per source IP
//! (`ip:<address>`, optional).
//!
//! Counters live in the [`AttemptStore`], so lockouts survive restarts and
//! are shared by every process. The increment and the lock decision are
//! one atomic store operation.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::ThrottlePolicy;
use crate::constants::{metric_names, throttle_keys};
use crate::error::Result;
use crate::providers::{AttemptStore, Clock};
use crate::state::AttemptRecord;
use crate::utils::{normalize_email, with_timeout};

/// Throttle key for an account.
///
/// # Examples
///
/// ```
/// # use paddock_auth::throttle::account_key;
/// assert_eq!(account_key(" User@X.com"), "account:user@x.com");
/// ```
#[must_use]
pub fn account_key(email: &str) -> String {
    format!("{}{}", throttle_keys::ACCOUNT_PREFIX, normalize_email(email))
}

/// Throttle key for a source address.
#[must_use]
pub fn ip_key(ip: IpAddr) -> String {
    format!("{}{ip}", throttle_keys::IP_PREFIX)
}

/// Login throttle over an [`AttemptStore`].
#[derive(Clone)]
pub struct LoginThrottle<A> {
    store: A,
    clock: Arc<dyn Clock>,
    store_timeout: std::time::Duration,
    account_policy: ThrottlePolicy,
    ip_policy: Option<ThrottlePolicy>,
}

impl<A> LoginThrottle<A>
where
    A: AttemptStore,
{
    /// Create a throttle.
    pub fn new(
        store: A,
        clock: Arc<dyn Clock>,
        store_timeout: std::time::Duration,
        account_policy: ThrottlePolicy,
        ip_policy: Option<ThrottlePolicy>,
    ) -> Self {
        Self {
            store,
            clock,
            store_timeout,
            account_policy,
            ip_policy,
        }
    }

    /// Policy that applies to `key`, `None` if the key kind is not
    /// throttled.
    #[must_use]
    pub fn policy_for(&self, key: &str) -> Option<ThrottlePolicy> {
        if key.starts_with(throttle_keys::IP_PREFIX) {
            self.ip_policy
        } else {
            Some(self.account_policy)
        }
    }

    /// Count one failure for `key`. Returns the failure count in the
    /// current window.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn record_failure(&self, key: &str) -> Result<u32> {
        let Some(policy) = self.policy_for(key) else {
            return Ok(0);
        };

        let now = self.clock.now();
        let record = with_timeout(
            self.store_timeout,
            "attempts.increment",
            self.store.increment_failure(key, now, &policy),
        )
        .await?;

        if record.failure_count == policy.max_failures {
            tracing::warn!(
                key,
                failures = record.failure_count,
                locked_until = ?record.locked_until,
                "Login throttle engaged"
            );
            metrics::counter!(metric_names::LOCKOUTS).increment(1);
        } else {
            tracing::debug!(key, failures = record.failure_count, "Login failure recorded");
        }

        Ok(record.failure_count)
    }

    /// Reset the counter for `key` and clear any lock.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn record_success(&self, key: &str) -> Result<()> {
        with_timeout(self.store_timeout, "attempts.reset", self.store.reset(key)).await
    }

    /// Current counter record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn status(&self, key: &str) -> Result<Option<AttemptRecord>> {
        with_timeout(self.store_timeout, "attempts.get", self.store.get(key)).await
    }

    /// End of the lock on `key`, if it is locked now.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn lock_status(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let now = self.clock.now();
        Ok(self
            .status(key)
            .await?
            .and_then(|record| record.locked_at(now)))
    }

    /// Returns `true` if `key` is locked now.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn is_locked(&self, key: &str) -> Result<bool> {
        Ok(self.lock_status(key).await?.is_some())
    }

    /// Lock end for a login attempt, checking both the account key and,
    /// when enabled, the source IP key. Returns the later of the two.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn login_lock(&self, email: &str, ip: Option<IpAddr>) -> Result<Option<DateTime<Utc>>> {
        let account_lock = self.lock_status(&account_key(email)).await?;
        let ip_lock = match ip {
            Some(ip) if self.ip_policy.is_some() => self.lock_status(&ip_key(ip)).await?,
            _ => None,
        };
        Ok(account_lock.max(ip_lock))
    }

    /// Count a failed login against the account and, when enabled, the
    /// source IP. Returns the account's failure count.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn record_login_failure(&self, email: &str, ip: Option<IpAddr>) -> Result<u32> {
        let count = self.record_failure(&account_key(email)).await?;
        if let Some(ip) = ip {
            self.record_failure(&ip_key(ip)).await?;
        }
        Ok(count)
    }

    /// Administrative unlock of `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn unlock(&self, key: &str) -> Result<()> {
        self.record_success(key).await?;
        tracing::info!(key, "Throttle key unlocked");
        Ok(())
    }

    /// Delete counters that can no longer lock anyone: no active lock and
    /// a window older than the longest configured window. Returns the
    /// number of counters deleted.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails or times out.
    pub async fn purge_stale(&self) -> Result<u64> {
        let longest_window = self
            .ip_policy
            .map_or(self.account_policy.window, |ip| ip.window.max(self.account_policy.window));
        let now = self.clock.now();
        let count = with_timeout(
            self.store_timeout,
            "attempts.delete_stale",
            self.store.delete_stale(now, now - longest_window),
        )
        .await?;
        tracing::info!(count, "Stale login attempt counters purged");
        Ok(count)
    }
}
