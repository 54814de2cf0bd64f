//! # Paddock Admin Authentication & Authorization
//!
//! Credential issuance and event-scoped authorization for the Paddock
//! car-show admin dashboard.
//!
//! ## Components
//!
//! - [`password`]: Argon2id hashing and verification
//! - [`tokens`]: signed access and refresh tokens
//! - [`registry`]: server-side, revocable sessions keyed by token fingerprint
//! - [`throttle`]: persistent failed-login counters and lockout
//! - [`gate`]: the single allow / redirect decision for the admin area
//! - [`service`]: the login flow and account administration built on top
//!
//! ## Roles
//!
//! `super_admin`, `admin` and `management` are global and reach every
//! event. `organizer`, `event_staff`, `gate_staff` and `viewer` are confined
//! to the one event in the account's `assigned_event_id`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use paddock_auth::*;
//!
//! let service = AuthService::new(config, accounts, sessions, attempts, clock)?;
//!
//! let success = service
//!     .login(LoginRequest { identifier, secret, remember_me: false }, device)
//!     .await?;
//!
//! match service.authorize(Some(&success.access.token), "/admin/events/42").await {
//!     GateDecision::Allow(principal) => { /* serve */ }
//!     GateDecision::RedirectLogin { .. } => { /* to login */ }
//!     GateDecision::RedirectScoped { location } => { /* to own event */ }
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod gate;
pub mod password;
pub mod providers;
pub mod registry;
pub mod service;
pub mod state;
pub mod stores;
pub mod throttle;
pub mod tokens;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use config::{AuthConfig, ConfigError, HashCost, ProtectedArea, SigningSecret, ThrottlePolicy};
pub use error::{AuthError, Result};
pub use gate::{AuthorizationGate, GateDecision, PathAccess, authorize_path};
pub use password::PasswordHasher;
pub use providers::{AccountStore, AttemptStore, Clock, SessionStore, SystemClock};
pub use registry::SessionRegistry;
pub use service::{AuthService, CreateAccount, LoginRequest, LoginSuccess};
pub use state::{
    Account, AccountId, AccountSummary, AttemptRecord, DeviceMeta, EventId, NewAccount, Principal,
    Role, Session, SessionId, SessionStatus, TokenFingerprint, TokenKind,
};
pub use throttle::LoginThrottle;
pub use tokens::{AccessClaims, IssuedToken, RefreshClaims, TokenError, TokenService};
