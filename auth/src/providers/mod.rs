//! Authentication providers.
//!
//! Traits for everything the auth subsystem consumes from the outside
//! world: the relational store (accounts, sessions, login attempts) and
//! the wall clock.
//!
//! # Implementations
//!
//! - `crate::mocks`: in-memory, for tests (`test-utils` feature)
//! - `crate::stores::postgres`: `PostgreSQL` via `sqlx` (`postgres` feature)
//!
//! Every store method returns a `Send` future so the services built on top
//! can be shared across a multi-threaded runtime and can spawn best-effort
//! writes.

pub mod account;
pub mod attempts;
pub mod clock;
pub mod session;

pub use account::AccountStore;
pub use attempts::AttemptStore;
pub use clock::{Clock, SystemClock};
pub use session::SessionStore;
