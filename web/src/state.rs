//! Application state for Axum handlers.

use paddock_auth::stores::postgres::{
    PostgresAccountStore, PostgresAttemptStore, PostgresSessionStore,
};
use axum::extract::FromRef;
use paddock_auth::AuthService;
use std::sync::Arc;

use crate::cookies::CookieSettings;
use crate::extractors::TrustedProxies;

/// State shared by every handler: the auth service plus cookie settings.
///
/// Generic over the three stores so tests can run the router on the
/// in-memory mocks.
pub struct AppState<A, S, T> {
    /// Authentication service.
    pub auth: Arc<AuthService<A, S, T>>,
    /// Credential cookie attributes.
    pub cookies: CookieSettings,
    /// Target of login redirects.
    pub login_path: Arc<str>,
    /// Proxies allowed to report the client address.
    pub trusted_proxies: TrustedProxies,
}

impl<A, S, T> AppState<A, S, T> {
    /// Create the state.
    pub fn new(auth: AuthService<A, S, T>, cookies: CookieSettings, login_path: &str) -> Self {
        Self {
            auth: Arc::new(auth),
            cookies,
            login_path: Arc::from(login_path),
            trusted_proxies: TrustedProxies::default(),
        }
    }

    /// Believe forwarding headers from these proxies.
    #[must_use]
    pub fn with_trusted_proxies(mut self, proxies: TrustedProxies) -> Self {
        self.trusted_proxies = proxies;
        self
    }
}

impl<A, S, T> Clone for AppState<A, S, T> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            cookies: self.cookies.clone(),
            login_path: Arc::clone(&self.login_path),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

impl<A, S, T> FromRef<AppState<A, S, T>> for TrustedProxies {
    fn from_ref(state: &AppState<A, S, T>) -> Self {
        state.trusted_proxies.clone()
    }
}

/// State of the production server.
pub type PgAppState = AppState<PostgresAccountStore, PostgresSessionStore, PostgresAttemptStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<PgAppState>();
    }
}
