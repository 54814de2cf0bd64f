//! HTTP surface of the Paddock admin authentication.
//!
//! Wraps [`paddock_auth::AuthService`] in an axum router: the login,
//! logout and refresh endpoints, credential cookies, and the gate
//! middleware that guards everything under the protected area.
//!
//! # Request Flow
//!
//! 1. **Correlation ID** is read from `X-Correlation-ID` or generated
//! 2. **Gate** runs for paths under the protected area: allow, redirect to
//!    login, or redirect to the caller's own event
//! 3. **Handler** reads the [`Principal`](paddock_auth::Principal) from the
//!    request extensions
//! 4. **Errors** map to a status plus a generic message through [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! use paddock_web::{AppState, CookieSettings, app_router};
//!
//! let state = AppState::new(auth_service, CookieSettings::default(), "/login");
//! let app = app_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cookies;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use config::WebConfig;
pub use cookies::CookieSettings;
pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId, RequestDevice, TrustedProxies, UserAgent};
pub use middleware::{CORRELATION_ID_HEADER, admin_gate, correlate};
pub use router::app_router;
pub use state::{AppState, PgAppState};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
