//! Mock provider implementations for testing.
//!
//! Simple, in-memory implementations of every provider trait, plus a
//! controllable clock. The stores can be switched into an "unavailable"
//! mode to exercise fail-closed paths.

pub mod account;
pub mod attempts;
pub mod clock;
pub mod session;

pub use account::MockAccountStore;
pub use attempts::MockAttemptStore;
pub use clock::MockClock;
pub use session::MockSessionStore;

use crate::error::AuthError;

fn lock_failed() -> AuthError {
    AuthError::InternalError("Mutex lock failed".to_string())
}

fn unavailable() -> AuthError {
    AuthError::StoreUnavailable("mock store offline".to_string())
}
