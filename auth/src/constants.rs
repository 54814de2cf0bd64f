//! Authentication constants.

/// Prefixes of login-throttle keys.
pub mod throttle_keys {
    /// Per-account key: `account:<normalized email>`.
    pub const ACCOUNT_PREFIX: &str = "account:";

    /// Per-source key: `ip:<address>`.
    pub const IP_PREFIX: &str = "ip:";
}

/// `iss` claim written into every token.
pub const DEFAULT_ISSUER: &str = "paddock";

/// Protected area root for the admin dashboard.
pub const DEFAULT_ADMIN_ROOT: &str = "/admin";

/// Minimum signing secret length in bytes (HS256 key size).
pub const MIN_SECRET_BYTES: usize = 32;

/// Metric names.
pub mod metric_names {
    /// Successful logins.
    pub const LOGINS: &str = "paddock_auth_logins_total";

    /// Failed logins, labelled by kind.
    pub const LOGIN_FAILURES: &str = "paddock_auth_login_failures_total";

    /// Throttle keys that crossed the lockout threshold.
    pub const LOCKOUTS: &str = "paddock_auth_lockouts_total";

    /// Gate decisions, labelled by outcome.
    pub const GATE_DECISIONS: &str = "paddock_auth_gate_decisions_total";

    /// Store calls abandoned at their deadline, labelled by operation.
    pub const STORE_TIMEOUTS: &str = "paddock_auth_store_timeouts_total";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_key_prefixes_are_distinct() {
        assert_ne!(throttle_keys::ACCOUNT_PREFIX, throttle_keys::IP_PREFIX);
        assert!(throttle_keys::ACCOUNT_PREFIX.ends_with(':'));
    }

    #[test]
    fn test_admin_root_has_no_trailing_slash() {
        assert!(DEFAULT_ADMIN_ROOT.starts_with('/'));
        assert!(!DEFAULT_ADMIN_ROOT.ends_with('/'));
    }
}
