//! Domain types for accounts, sessions and authorization.
//!
//! Everything here is plain data: `Clone`, serializable where it crosses a
//! boundary, and free of I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::config::ThrottlePolicy;
use crate::error::AuthError;
use crate::utils::parse_device_type;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for an admin account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub uuid::Uuid);

impl AccountId {
    /// Generate a new random `AccountId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a car-show event, as assigned by the events table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Roles
// ═══════════════════════════════════════════════════════════════════════

/// Admin role.
///
/// Global roles may reach every event. Every other role is confined to the
/// single event stored in the account's `assigned_event_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform owner.
    SuperAdmin,
    /// Platform administrator.
    Admin,
    /// Read/write access to every event for the management team.
    Management,
    /// Runs one event.
    Organizer,
    /// Staff member of one event.
    EventStaff,
    /// Check-in staff at the gate of one event.
    GateStaff,
    /// Read-only access to one event.
    Viewer,
}

impl Role {
    /// Every role, global ones first.
    pub const ALL: [Self; 7] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::Management,
        Self::Organizer,
        Self::EventStaff,
        Self::GateStaff,
        Self::Viewer,
    ];

    /// Returns `true` for roles that may reach any event.
    ///
    /// # Examples
    ///
    /// ```
    /// # use paddock_auth::Role;
    /// assert!(Role::Management.is_global());
    /// assert!(!Role::GateStaff.is_global());
    /// ```
    #[must_use]
    pub const fn is_global(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin | Self::Management)
    }

    /// Returns `true` for roles confined to one assigned event.
    #[must_use]
    pub const fn is_event_scoped(self) -> bool {
        !self.is_global()
    }

    /// Stable storage and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Management => "management",
            Self::Organizer => "organizer",
            Self::EventStaff => "event_staff",
            Self::GateStaff => "gate_staff",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AuthError::InvalidInput(format!("unknown role: {s}")))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Accounts
// ═══════════════════════════════════════════════════════════════════════

/// A credential holder, as stored in the `accounts` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Normalized (trimmed, lower-cased) email.
    pub email: String,
    /// PHC-format Argon2id hash.
    pub password_hash: String,
    /// Name shown in the admin UI.
    pub display_name: String,
    /// Role.
    pub role: Role,
    /// Event the account is confined to; ignored for global roles.
    pub assigned_event_id: Option<EventId>,
    /// Soft-deactivation flag.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Event this account is confined to, if its role is event-scoped.
    ///
    /// Returns `Ok(None)` for global roles.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MisconfiguredAccount`] when the role is
    /// event-scoped but no event is assigned.
    pub const fn scope(&self) -> Result<Option<EventId>, AuthError> {
        check_scope(self.role, self.assigned_event_id)
    }

    /// Public summary returned by the login endpoint.
    #[must_use]
    pub const fn summary(&self) -> AccountSummary {
        AccountSummary {
            account_id: self.id,
            role: self.role,
            assigned_event_id: if self.role.is_global() {
                None
            } else {
                self.assigned_event_id
            },
        }
    }
}

/// Check the role / assigned event invariant.
///
/// # Errors
///
/// Returns [`AuthError::MisconfiguredAccount`] for an event-scoped role
/// without an event.
pub const fn check_scope(
    role: Role,
    assigned_event_id: Option<EventId>,
) -> Result<Option<EventId>, AuthError> {
    if role.is_global() {
        return Ok(None);
    }
    match assigned_event_id {
        Some(event_id) => Ok(Some(event_id)),
        None => Err(AuthError::MisconfiguredAccount),
    }
}

/// Row to insert for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Normalized email.
    pub email: String,
    /// Already-hashed password.
    pub password_hash: String,
    /// Display name.
    pub display_name: String,
    /// Role.
    pub role: Role,
    /// Assigned event (required for event-scoped roles).
    pub assigned_event_id: Option<EventId>,
}

/// `{accountId, role, assignedEventId}` as returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// Account ID.
    pub account_id: AccountId,
    /// Role.
    pub role: Role,
    /// Assigned event, `null` for global roles.
    pub assigned_event_id: Option<EventId>,
}

// ═══════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════

/// Token class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived credential presented on every request.
    Access,
    /// Longer-lived credential that can only mint new access tokens.
    Refresh,
}

impl TokenKind {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl FromStr for TokenKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(AuthError::InvalidInput(format!("unknown token kind: {other}"))),
        }
    }
}

/// Stored, comparable representation of an issued token.
///
/// The SHA-256 hex digest of the token's unique identifier (`jti`). The
/// raw token is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenFingerprint(String);

impl TokenFingerprint {
    /// Fingerprint of a token identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// # use paddock_auth::TokenFingerprint;
    /// let fp = TokenFingerprint::of_jti("abc");
    /// assert_eq!(fp.as_str().len(), 64);
    /// assert_ne!(fp.as_str(), "abc");
    /// ```
    #[must_use]
    pub fn of_jti(jti: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(jti.as_bytes())))
    }

    /// Wrap a fingerprint read back from storage.
    #[must_use]
    pub const fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

/// Client device information recorded with a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// Source IP address, if known.
    pub ip_address: Option<IpAddr>,
    /// Raw `User-Agent` header.
    pub user_agent: Option<String>,
    /// `mobile`, `tablet` or `desktop`.
    pub device_type: String,
}

impl DeviceMeta {
    /// Build metadata from request details.
    #[must_use]
    pub fn from_request(ip_address: Option<IpAddr>, user_agent: Option<String>) -> Self {
        let device_type = user_agent
            .as_deref()
            .map_or("desktop", parse_device_type)
            .to_string();
        Self {
            ip_address,
            user_agent,
            device_type,
        }
    }
}

/// Server-side record of one issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID.
    pub id: SessionId,
    /// Owner.
    pub account_id: AccountId,
    /// Fingerprint of the token's `jti`.
    pub fingerprint: TokenFingerprint,
    /// Which token class this row tracks.
    pub kind: TokenKind,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
    /// Last authenticated request (best effort).
    pub last_activity_at: DateTime<Utc>,
    /// Client device.
    pub device: DeviceMeta,
    /// Cleared on logout or revocation.
    pub is_active: bool,
}

impl Session {
    /// A session is valid only while active and unexpired.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }
}

/// Result of looking a fingerprint up in the session registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Session exists and is valid.
    Active(Session),
    /// Session exists but has passed its expiry.
    Expired,
    /// Session was revoked.
    Revoked,
    /// No session row for this fingerprint.
    Unknown,
}

impl SessionStatus {
    /// Classify a stored row at `now`.
    #[must_use]
    pub fn classify(session: Option<Session>, now: DateTime<Utc>) -> Self {
        match session {
            None => Self::Unknown,
            Some(session) if !session.is_active => Self::Revoked,
            Some(session) if now >= session.expires_at => Self::Expired,
            Some(session) => Self::Active(session),
        }
    }

    /// Returns `true` for [`SessionStatus::Active`].
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Error describing why a non-active session was refused.
    #[must_use]
    pub const fn as_error(&self) -> Option<AuthError> {
        match self {
            Self::Active(_) => None,
            Self::Expired => Some(AuthError::SessionExpired),
            Self::Revoked => Some(AuthError::SessionRevoked),
            Self::Unknown => Some(AuthError::SessionNotFound),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Throttle
// ═══════════════════════════════════════════════════════════════════════

/// Persisted failure counter for one throttle key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// `account:<email>` or `ip:<address>`.
    pub key: String,
    /// Failures in the current window.
    pub failure_count: u32,
    /// Start of the current window.
    pub window_started_at: DateTime<Utc>,
    /// End of the lockout, if one was imposed.
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Lock end if the key is locked at `now`.
    #[must_use]
    pub fn locked_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| now < *until)
    }

    /// Record that follows one more failure at `now`.
    ///
    /// This is the in-memory statement of the store's atomic update; stores
    /// apply it under their own lock or as a single SQL statement.
    #[must_use]
    pub fn after_failure(
        previous: Option<&Self>,
        key: &str,
        now: DateTime<Utc>,
        policy: &ThrottlePolicy,
    ) -> Self {
        let continuing = previous.filter(|record| match record.locked_until {
            Some(until) => now < until,
            None => now < record.window_started_at + policy.window,
        });

        let (failure_count, window_started_at, locked_until) = match continuing {
            Some(record) => (
                record.failure_count.saturating_add(1),
                record.window_started_at,
                record.locked_until,
            ),
            None => (1, now, None),
        };

        let locked_until = locked_until.or_else(|| {
            (failure_count >= policy.max_failures).then(|| now + policy.lockout)
        });

        Self {
            key: key.to_string(),
            failure_count,
            window_started_at,
            locked_until,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Authorization
// ═══════════════════════════════════════════════════════════════════════

/// Authenticated caller, established by the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Account ID.
    pub account_id: AccountId,
    /// Role from the verified token.
    pub role: Role,
    /// Assigned event from the verified token.
    pub assigned_event_id: Option<EventId>,
    /// Session the request belongs to.
    #[serde(skip)]
    pub session_id: SessionId,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn global_roles_are_exactly_three() {
        let global: Vec<_> = Role::ALL.into_iter().filter(|r| r.is_global()).collect();
        assert_eq!(global, vec![Role::SuperAdmin, Role::Admin, Role::Management]);
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::EventStaff).unwrap_or_default();
        assert_eq!(json, "\"event_staff\"");
    }

    #[test]
    fn scoped_role_without_event_is_misconfigured() {
        assert_eq!(
            check_scope(Role::Organizer, None),
            Err(AuthError::MisconfiguredAccount)
        );
        assert_eq!(check_scope(Role::Organizer, Some(EventId(42))), Ok(Some(EventId(42))));
        assert_eq!(check_scope(Role::Admin, Some(EventId(42))), Ok(None));
    }

    #[test]
    fn summary_uses_camel_case() {
        let summary = AccountSummary {
            account_id: AccountId(uuid::Uuid::nil()),
            role: Role::Organizer,
            assigned_event_id: Some(EventId(42)),
        };
        let json = serde_json::to_value(summary).unwrap_or_default();
        assert_eq!(json["assignedEventId"], 42);
        assert_eq!(json["role"], "organizer");
        assert!(json.get("accountId").is_some());
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = TokenFingerprint::of_jti("6f1c");
        let b = TokenFingerprint::of_jti("6f1c");
        assert_eq!(a, b);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, TokenFingerprint::of_jti("6f1d"));
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn fingerprint_is_lowercase_sha256() {
        assert_eq!(
            TokenFingerprint::of_jti("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn session_status_classification() {
        let now = Utc::now();
        let session = Session {
            id: SessionId::new(),
            account_id: AccountId::new(),
            fingerprint: TokenFingerprint::of_jti("x"),
            kind: TokenKind::Access,
            issued_at: now,
            expires_at: now + Duration::minutes(5),
            last_activity_at: now,
            device: DeviceMeta::default(),
            is_active: true,
        };

        assert!(SessionStatus::classify(Some(session.clone()), now).is_active());
        assert_eq!(
            SessionStatus::classify(Some(session.clone()), now + Duration::minutes(5)),
            SessionStatus::Expired
        );

        let revoked = Session {
            is_active: false,
            ..session
        };
        assert_eq!(SessionStatus::classify(Some(revoked), now), SessionStatus::Revoked);
        assert_eq!(SessionStatus::classify(None, now), SessionStatus::Unknown);
    }

    #[test]
    fn failures_lock_at_threshold_and_restart_after_lock() {
        let policy = ThrottlePolicy::default();
        let start = Utc::now();

        let mut record = AttemptRecord::after_failure(None, "account:a@x.com", start, &policy);
        for _ in 1..policy.max_failures {
            assert!(record.locked_at(start).is_none());
            record = AttemptRecord::after_failure(Some(&record), "account:a@x.com", start, &policy);
        }
        assert_eq!(record.failure_count, 5);
        assert_eq!(record.locked_at(start), Some(start + policy.lockout));

        // Failures during the lock keep counting but do not extend it.
        let later = start + Duration::minutes(14);
        let during = AttemptRecord::after_failure(Some(&record), "account:a@x.com", later, &policy);
        assert_eq!(during.failure_count, 6);
        assert_eq!(during.locked_until, record.locked_until);

        let after = start + policy.lockout;
        let fresh = AttemptRecord::after_failure(Some(&during), "account:a@x.com", after, &policy);
        assert_eq!(fresh.failure_count, 1);
        assert!(fresh.locked_until.is_none());
        assert_eq!(fresh.window_started_at, after);
    }

    #[test]
    fn elapsed_window_restarts_count() {
        let policy = ThrottlePolicy::default();
        let start = Utc::now();
        let record = AttemptRecord::after_failure(None, "k", start, &policy);
        let record = AttemptRecord::after_failure(Some(&record), "k", start, &policy);
        assert_eq!(record.failure_count, 2);

        let next = AttemptRecord::after_failure(Some(&record), "k", start + policy.window, &policy);
        assert_eq!(next.failure_count, 1);
    }

    #[test]
    fn device_meta_detects_type() {
        let meta = DeviceMeta::from_request(
            None,
            Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".into()),
        );
        assert_eq!(meta.device_type, "mobile");
        assert_eq!(DeviceMeta::from_request(None, None).device_type, "desktop");
    }
}
