//! Authentication configuration.
//!
//! [`AuthConfig`] gathers every tunable of the admin auth subsystem. It is
//! built either with the `with_*` builders or from `PADDOCK_*` environment
//! variables via [`AuthConfig::from_env`]. Parsing goes through a lookup
//! function so tests can supply their own values.

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use thiserror::Error;

use crate::constants::{DEFAULT_ADMIN_ROOT, DEFAULT_ISSUER, MIN_SECRET_BYTES};
use crate::state::EventId;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The signing secret is too short for HS256.
    #[error("Signing secret must be at least {min} bytes")]
    SecretTooShort {
        /// Minimum length in bytes
        min: usize,
    },
}

// ═══════════════════════════════════════════════════════════════════════
// Signing Secret
// ═══════════════════════════════════════════════════════════════════════

/// Symmetric token signing secret.
///
/// Debug output is redacted.
pub struct SigningSecret(SecretString);

impl SigningSecret {
    /// Wrap a secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SecretTooShort`] if `secret` is shorter than
    /// 32 bytes.
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort {
                min: MIN_SECRET_BYTES,
            });
        }
        Ok(Self(SecretString::from(secret)))
    }

    /// Raw key bytes.
    #[must_use]
    pub fn expose_bytes(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }
}

impl Clone for SigningSecret {
    fn clone(&self) -> Self {
        Self(SecretString::from(self.0.expose_secret().to_owned()))
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Policies
// ═══════════════════════════════════════════════════════════════════════

/// Login throttle policy for one kind of key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Failures within `window` that trigger a lockout.
    ///
    /// Default: 5
    pub max_failures: u32,

    /// Fixed counting window.
    ///
    /// Default: 15 minutes
    pub window: Duration,

    /// How long a key stays locked.
    ///
    /// Default: 15 minutes
    pub lockout: Duration,
}

impl ThrottlePolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_failures: u32, window: Duration, lockout: Duration) -> Self {
        Self {
            max_failures,
            window,
            lockout,
        }
    }

    /// Default per-IP policy: 50 failures in 15 minutes.
    #[must_use]
    pub const fn per_ip() -> Self {
        Self::new(50, Duration::minutes(15), Duration::minutes(15))
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(5, Duration::minutes(15), Duration::minutes(15))
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory in KiB.
    ///
    /// Default: 19456 (19 MiB)
    pub memory_kib: u32,

    /// Number of passes.
    ///
    /// Default: 2
    pub iterations: u32,

    /// Degree of parallelism.
    ///
    /// Default: 1
    pub parallelism: u32,
}

impl HashCost {
    /// Create a cost setting.
    #[must_use]
    pub const fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    /// Cheapest parameters Argon2 accepts. Only for tests.
    #[must_use]
    pub const fn minimal() -> Self {
        Self::new(8, 1, 1)
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self::new(19_456, 2, 1)
    }
}

/// The protected admin area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedArea {
    /// Root path, without trailing slash.
    root: String,
}

impl ProtectedArea {
    /// Create a protected area rooted at `root`. A trailing slash is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `root` does not start with `/`
    /// or is the site root itself, which would put the login page behind
    /// the gate.
    ///
    /// # Examples
    ///
    /// ```
    /// # use paddock_auth::ProtectedArea;
    /// let area = ProtectedArea::new("/dashboard/").expect("valid root");
    /// assert_eq!(area.root(), "/dashboard");
    /// assert!(ProtectedArea::new("/").is_err());
    /// ```
    pub fn new(root: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            key: "PADDOCK_ADMIN_ROOT",
            reason: reason.to_string(),
        };
        if !root.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        let trimmed = root.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(invalid("must not be the site root"));
        }
        Ok(Self {
            root: trimmed.to_string(),
        })
    }

    /// Root path, without trailing slash.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Landing path of one event: `<root>/events/<id>`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use paddock_auth::{ProtectedArea, EventId};
    /// let area = ProtectedArea::default();
    /// assert_eq!(area.event_prefix(EventId(42)), "/admin/events/42");
    /// ```
    #[must_use]
    pub fn event_prefix(&self, event_id: EventId) -> String {
        format!("{}/events/{event_id}", self.root)
    }

    /// Returns `true` if `path` lies inside this area.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        path == self.root
            || path
                .strip_prefix(self.root.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl Default for ProtectedArea {
    fn default() -> Self {
        Self {
            root: DEFAULT_ADMIN_ROOT.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Auth Configuration
// ═══════════════════════════════════════════════════════════════════════

/// Admin authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret.
    pub signing_secret: SigningSecret,

    /// `iss` claim.
    ///
    /// Default: `paddock`
    pub issuer: String,

    /// Access token lifetime.
    ///
    /// Default: 8 hours
    pub access_ttl: Duration,

    /// Refresh token lifetime.
    ///
    /// Default: 14 days
    pub refresh_ttl: Duration,

    /// Clock-skew tolerance when checking expiry.
    ///
    /// Default: 30 seconds
    pub leeway: Duration,

    /// Per-account throttle.
    pub account_throttle: ThrottlePolicy,

    /// Per-IP throttle, `None` to disable.
    pub ip_throttle: Option<ThrottlePolicy>,

    /// Deadline for every store call.
    ///
    /// Default: 3 seconds
    pub store_timeout: std::time::Duration,

    /// Minimum time between two session activity updates.
    ///
    /// Default: 60 seconds
    pub touch_interval: Duration,

    /// Argon2id cost for new hashes.
    pub hash_cost: HashCost,

    /// Minimum accepted password length.
    ///
    /// Default: 12
    pub min_password_length: usize,

    /// Protected area served behind the authorization gate.
    pub protected_area: ProtectedArea,
}

impl AuthConfig {
    /// Create a configuration with default policies.
    #[must_use]
    pub fn new(signing_secret: SigningSecret) -> Self {
        Self {
            signing_secret,
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl: Duration::hours(8),
            refresh_ttl: Duration::days(14),
            leeway: Duration::seconds(30),
            account_throttle: ThrottlePolicy::default(),
            ip_throttle: Some(ThrottlePolicy::per_ip()),
            store_timeout: std::time::Duration::from_secs(3),
            touch_interval: Duration::seconds(60),
            hash_cost: HashCost::default(),
            min_password_length: 12,
            protected_area: ProtectedArea::default(),
        }
    }

    /// Set the `iss` claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set access token lifetime.
    #[must_use]
    pub const fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Set refresh token lifetime.
    #[must_use]
    pub const fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Set expiry leeway.
    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Set the per-account throttle policy.
    #[must_use]
    pub const fn with_account_throttle(mut self, policy: ThrottlePolicy) -> Self {
        self.account_throttle = policy;
        self
    }

    /// Set (or disable) the per-IP throttle policy.
    #[must_use]
    pub const fn with_ip_throttle(mut self, policy: Option<ThrottlePolicy>) -> Self {
        self.ip_throttle = policy;
        self
    }

    /// Set the store call deadline.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the session activity update interval.
    #[must_use]
    pub const fn with_touch_interval(mut self, interval: Duration) -> Self {
        self.touch_interval = interval;
        self
    }

    /// Set the Argon2id cost for new hashes.
    #[must_use]
    pub const fn with_hash_cost(mut self, cost: HashCost) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Set the minimum password length.
    #[must_use]
    pub const fn with_min_password_length(mut self, length: usize) -> Self {
        self.min_password_length = length;
        self
    }

    /// Set the protected area.
    #[must_use]
    pub fn with_protected_area(mut self, area: ProtectedArea) -> Self {
        self.protected_area = area;
        self
    }

    /// Load configuration from `PADDOCK_*` environment variables.
    ///
    /// `PADDOCK_SIGNING_SECRET` is required; everything else falls back to
    /// its default. Callers that use a `.env` file load it with
    /// `dotenvy::dotenv()` first.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a missing secret or an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a missing secret or an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("PADDOCK_SIGNING_SECRET")
            .ok_or(ConfigError::Missing("PADDOCK_SIGNING_SECRET"))?;
        let mut config = Self::new(SigningSecret::new(secret)?);

        if let Some(issuer) = lookup("PADDOCK_TOKEN_ISSUER") {
            config.issuer = issuer;
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "PADDOCK_ACCESS_TTL_SECS")? {
            config.access_ttl = positive_seconds("PADDOCK_ACCESS_TTL_SECS", secs)?;
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "PADDOCK_REFRESH_TTL_SECS")? {
            config.refresh_ttl = positive_seconds("PADDOCK_REFRESH_TTL_SECS", secs)?;
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "PADDOCK_TOKEN_LEEWAY_SECS")? {
            config.leeway = Duration::seconds(secs.max(0));
        }

        if let Some(max) = parse::<u32, _>(&lookup, "PADDOCK_LOGIN_MAX_FAILURES")? {
            config.account_throttle.max_failures = max.max(1);
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "PADDOCK_LOGIN_WINDOW_SECS")? {
            config.account_throttle.window = positive_seconds("PADDOCK_LOGIN_WINDOW_SECS", secs)?;
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "PADDOCK_LOCKOUT_SECS")? {
            config.account_throttle.lockout = positive_seconds("PADDOCK_LOCKOUT_SECS", secs)?;
        }
        match parse::<u32, _>(&lookup, "PADDOCK_IP_MAX_FAILURES")? {
            Some(0) => config.ip_throttle = None,
            Some(max) => {
                config.ip_throttle = Some(ThrottlePolicy {
                    max_failures: max,
                    ..ThrottlePolicy::per_ip()
                });
            }
            None => {}
        }

        if let Some(ms) = parse::<u64, _>(&lookup, "PADDOCK_STORE_TIMEOUT_MS")? {
            config.store_timeout = std::time::Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = parse::<i64, _>(&lookup, "PADDOCK_TOUCH_INTERVAL_SECS")? {
            config.touch_interval = Duration::seconds(secs.max(0));
        }

        if let Some(kib) = parse::<u32, _>(&lookup, "PADDOCK_HASH_MEMORY_KIB")? {
            config.hash_cost.memory_kib = kib;
        }
        if let Some(iterations) = parse::<u32, _>(&lookup, "PADDOCK_HASH_ITERATIONS")? {
            config.hash_cost.iterations = iterations;
        }
        if let Some(parallelism) = parse::<u32, _>(&lookup, "PADDOCK_HASH_PARALLELISM")? {
            config.hash_cost.parallelism = parallelism;
        }
        if let Some(length) = parse::<usize, _>(&lookup, "PADDOCK_MIN_PASSWORD_LENGTH")? {
            config.min_password_length = length;
        }
        if let Some(root) = lookup("PADDOCK_ADMIN_ROOT") {
            config.protected_area = ProtectedArea::new(&root)?;
        }

        Ok(config)
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn positive_seconds(key: &'static str, secs: i64) -> Result<Duration, ConfigError> {
    if secs <= 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::seconds(secs))
}
