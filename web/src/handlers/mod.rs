//! HTTP request handlers.

pub mod health;
pub mod login;
pub mod session;

pub use health::health_check;
