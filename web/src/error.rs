//! Error types for web handlers.
//!
//! [`AppError`] turns [`AuthError`]s into HTTP responses. The response body
//! only ever carries the generic public message; the specific failure kind
//! stays in the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use paddock_auth::AuthError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState<A, S, T>>) -> Result<Json<Body>, AppError> {
///     let account = state.auth.find_account(&email).await?;
///     Ok(Json(body))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal detail, logged but never sent
    detail: Option<String>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            detail: None,
        }
    }

    /// Attach internal detail for the logs.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message, "CONFLICT")
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// Create a 429 Too Many Requests error.
    #[must_use]
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message, "TOO_MANY_ATTEMPTS")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, "SERVICE_UNAVAILABLE")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                detail = self.detail.as_deref().unwrap_or(""),
                "Request failed"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.public_message();
        let mapped = match &err {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::MisconfiguredAccount
            | AuthError::SessionExpired
            | AuthError::SessionRevoked
            | AuthError::SessionNotFound
            | AuthError::InvalidToken(_) => Self::unauthorized(message),
            AuthError::AccountLocked { .. } => Self::too_many_requests(message),
            AuthError::EmailTaken => Self::conflict(message),
            AuthError::WeakPassword { .. } | AuthError::InvalidInput(_) => {
                Self::validation(message)
            }
            AuthError::StoreUnavailable(_) => Self::unavailable(message),
            AuthError::InternalError(_) => Self::internal(message),
        };
        mapped.with_detail(err.to_string())
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_detail(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_authentication_failures_are_indistinguishable() {
        let kinds = [
            AuthError::InvalidCredentials,
            AuthError::AccountInactive,
            AuthError::MisconfiguredAccount,
        ];
        for err in kinds {
            let app = AppError::from(err);
            assert_eq!(app.status, StatusCode::UNAUTHORIZED);
            assert_eq!(app.message, paddock_auth::error::INVALID_LOGIN_MESSAGE);
        }
    }

    #[test]
    fn test_lockout_hides_remaining_time() {
        let until = Utc::now() + chrono::Duration::minutes(15);
        let app = AppError::from(AuthError::AccountLocked { until });
        assert_eq!(app.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(!app.message.contains(&until.to_rfc3339()));
        assert!(app.detail.is_some());
    }

    #[test]
    fn test_store_outage_is_503() {
        let app = AppError::from(AuthError::StoreUnavailable("pool timed out".into()));
        assert_eq!(app.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!app.message.contains("pool"));
    }
}
