//! Utility functions for authentication.

use std::future::Future;
use std::time::Duration;

use crate::constants::metric_names;
use crate::error::{AuthError, Result};

/// Normalize an email for storage and lookup.
///
/// Emails are case-insensitive identifiers: surrounding whitespace is
/// dropped and the whole address is lower-cased.
///
/// # Examples
///
/// ```
/// use paddock_auth::utils::normalize_email;
///
/// assert_eq!(normalize_email("  User@X.com "), "user@x.com");
/// ```
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Parse device type from user agent string.
///
/// Returns one of: "mobile", "tablet", "desktop"
///
/// # Examples
///
/// ```
/// use paddock_auth::utils::parse_device_type;
///
/// assert_eq!(parse_device_type("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"), "mobile");
/// assert_eq!(parse_device_type("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"), "tablet");
/// assert_eq!(parse_device_type("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"), "desktop");
/// ```
#[must_use]
pub fn parse_device_type(user_agent: &str) -> &'static str {
    let ua_lower = user_agent.to_lowercase();

    if ua_lower.contains("ipad") || ua_lower.contains("tablet") {
        return "tablet";
    }

    if ua_lower.contains("iphone") || ua_lower.contains("android") || ua_lower.contains("mobile") {
        return "mobile";
    }

    "desktop"
}

/// Validate email address format.
///
/// Basic structural validation only:
/// - exactly one `@`
/// - non-empty local part, domain with at least one dot and no empty labels
/// - length between 3 and 254 characters
///
/// # Examples
///
/// ```
/// use paddock_auth::utils::is_valid_email;
///
/// assert!(is_valid_email("user@example.com"));
/// assert!(is_valid_email("user+tag@subdomain.example.com"));
/// assert!(!is_valid_email("invalid"));
/// assert!(!is_valid_email("@example.com"));
/// assert!(!is_valid_email("user@"));
/// ```
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > 254 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    let valid_local_char =
        |c: char| c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '_' | '\'');
    let valid_domain_char = |c: char| c.is_alphanumeric() || matches!(c, '.' | '-');

    if !local.chars().all(valid_local_char) || !domain.chars().all(valid_domain_char) {
        return false;
    }

    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

/// Run a store call under a deadline.
///
/// A call that does not finish within `limit` is abandoned and reported as
/// [`AuthError::StoreUnavailable`]. Dropping the returned future cancels the
/// inner call.
///
/// # Errors
///
/// Returns the inner error, or `StoreUnavailable` on timeout.
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if let Ok(result) = tokio::time::timeout(limit, call).await {
        result
    } else {
        tracing::error!(operation, timeout_ms = limit.as_millis(), "Store call timed out");
        metrics::counter!(metric_names::STORE_TIMEOUTS, "operation" => operation)
            .increment(1);
        Err(AuthError::StoreUnavailable(format!("{operation} timed out")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("User@Example.COM"), "user@example.com");
        assert_eq!(normalize_email("\tuser@x.com\n"), "user@x.com");
    }

    #[test]
    fn test_parse_device_type() {
        assert_eq!(parse_device_type("Mozilla/5.0 (Linux; Android 13)"), "mobile");
        assert_eq!(parse_device_type("Mozilla/5.0 (Linux; Android 13; Tablet)"), "tablet");
        assert_eq!(parse_device_type("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)"), "desktop");
    }

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@example.com"));
        assert!(is_valid_email("o'brien@example.ie"));
        assert!(is_valid_email("user-name@example.co.uk"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("user@example..com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), "noop", async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_reports_store_unavailable() {
        let result: Result<()> = with_timeout(Duration::from_millis(50), "slow", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
    }
}
