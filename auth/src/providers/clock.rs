//! Wall clock provider.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Token expiry, session validity and throttle windows are all evaluated
/// against this clock so tests can move time explicitly.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
