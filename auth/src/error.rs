//! Error types for authentication and authorization operations.

use crate::tokens::TokenError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the admin auth subsystem.
///
/// Variants are specific so that internal logs can record exactly what
/// happened. Callers facing the outside world must use
/// [`AuthError::public_message`], which collapses the authentication
/// failures into a handful of generic messages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Authentication Errors
    // ═══════════════════════════════════════════════════════════

    /// Wrong secret or unknown identifier.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The login throttle is engaged for this identifier.
    #[error("Account locked until {until}")]
    AccountLocked {
        /// End of the lockout window
        until: DateTime<Utc>,
    },

    /// The account has been deactivated.
    #[error("Account is inactive")]
    AccountInactive,

    /// Event-scoped role without an assigned event.
    #[error("Account has an event-scoped role but no assigned event")]
    MisconfiguredAccount,

    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// Session has been revoked.
    #[error("Session has been revoked")]
    SessionRevoked,

    /// No session row matches the presented token.
    #[error("Session not found")]
    SessionNotFound,

    /// Token failed verification.
    #[error("Invalid token: {0}")]
    InvalidToken(TokenError),

    // ═══════════════════════════════════════════════════════════
    // Account Management
    // ═══════════════════════════════════════════════════════════

    /// Another account already uses this email.
    #[error("Email already registered")]
    EmailTaken,

    /// Password shorter than the configured minimum.
    #[error("Password must be at least {min_length} characters")]
    WeakPassword {
        /// Minimum accepted length
        min_length: usize,
    },

    /// Malformed input (bad email, unknown role, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Transient infrastructure failure (store down or timed out).
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Message shown for every authentication failure.
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid email or password";

/// Message shown while the throttle is engaged.
pub const TOO_MANY_ATTEMPTS_MESSAGE: &str = "Too many attempts. Please try again later.";

/// Message shown when a session can no longer be used.
pub const SIGN_IN_AGAIN_MESSAGE: &str = "Please sign in again";

impl AuthError {
    /// Returns `true` if this error is due to invalid user input or state.
    ///
    /// # Examples
    ///
    /// ```
    /// # use paddock_auth::AuthError;
    /// assert!(AuthError::InvalidCredentials.is_user_error());
    /// assert!(!AuthError::StoreUnavailable("down".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::StoreUnavailable(_) | Self::InternalError(_))
    }

    /// Returns `true` for failures of the login step itself.
    ///
    /// These are merged into one user-facing message to prevent account
    /// enumeration.
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::AccountInactive | Self::MisconfiguredAccount
        )
    }

    /// Returns `true` when the caller must sign in again.
    #[must_use]
    pub const fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired
                | Self::SessionRevoked
                | Self::SessionNotFound
                | Self::InvalidToken(_)
        )
    }

    /// Returns `true` if retrying the whole request later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// User-facing message.
    ///
    /// Never reveals which part of an authentication attempt failed, nor
    /// how long a lockout lasts.
    ///
    /// # Examples
    ///
    /// ```
    /// # use paddock_auth::AuthError;
    /// assert_eq!(
    ///     AuthError::InvalidCredentials.public_message(),
    ///     AuthError::AccountInactive.public_message(),
    /// );
    /// ```
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials | Self::AccountInactive | Self::MisconfiguredAccount => {
                INVALID_LOGIN_MESSAGE
            }
            Self::AccountLocked { .. } => TOO_MANY_ATTEMPTS_MESSAGE,
            Self::SessionExpired
            | Self::SessionRevoked
            | Self::SessionNotFound
            | Self::InvalidToken(_) => SIGN_IN_AGAIN_MESSAGE,
            Self::EmailTaken => "Email already registered",
            Self::WeakPassword { .. } => "Password does not meet the minimum length",
            Self::InvalidInput(_) => "Invalid input",
            Self::StoreUnavailable(_) => "Service temporarily unavailable",
            Self::InternalError(_) => "Internal error",
        }
    }

    /// Stable kind label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountLocked { .. } => "account_locked",
            Self::AccountInactive => "account_inactive",
            Self::MisconfiguredAccount => "misconfigured_account",
            Self::SessionExpired => "session_expired",
            Self::SessionRevoked => "session_revoked",
            Self::SessionNotFound => "session_not_found",
            Self::InvalidToken(_) => "invalid_token",
            Self::EmailTaken => "email_taken",
            Self::WeakPassword { .. } => "weak_password",
            Self::InvalidInput(_) => "invalid_input",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::InternalError(_) => "internal_error",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        Self::InvalidToken(error)
    }
}
