//! Storage implementations for the auth system.
//!
//! - **Account store** (`PostgreSQL`) - admin accounts
//! - **Session store** (`PostgreSQL`) - revocable sessions keyed by token fingerprint
//! - **Attempt store** (`PostgreSQL`) - login throttle counters, updated atomically

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresAccountStore, PostgresAttemptStore, PostgresSessionStore};
