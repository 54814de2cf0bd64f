//! Credential cookies.
//!
//! | cookie            | content                  | flags                         |
//! |-------------------|--------------------------|-------------------------------|
//! | `paddock_access`  | access token             | `HttpOnly`, `Path=/`          |
//! | `paddock_refresh` | refresh token            | `HttpOnly`, `Path=/auth`      |
//! | `paddock_session` | base64url `{role, assignedEventId}` | script-readable, `Path=/` |
//!
//! All three share the configured `Secure` and `SameSite` settings. With
//! "remember me" the cookies carry a `Max-Age` matching their token;
//! otherwise the access and hint cookies end with the browser session.
//!
//! `paddock_session` exists for client-side UI branching only. The server
//! never reads it.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use paddock_auth::{AccountSummary, EventId, IssuedToken, LoginSuccess, Role};
use serde::Serialize;

/// Access token cookie.
pub const ACCESS_COOKIE: &str = "paddock_access";

/// Refresh token cookie.
pub const REFRESH_COOKIE: &str = "paddock_refresh";

/// Non-authoritative UI hint cookie.
pub const HINT_COOKIE: &str = "paddock_session";

/// Path the refresh cookie is scoped to.
pub const REFRESH_COOKIE_PATH: &str = "/auth";

/// Cookie attributes shared by every credential cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Send only over HTTPS. On everywhere except local development.
    pub secure: bool,
    /// `Lax` or `Strict`.
    pub same_site: SameSite,
    /// Explicit `Domain`, host-only when `None`.
    pub domain: Option<String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: SameSite::Lax,
            domain: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UiHint {
    role: Role,
    assigned_event_id: Option<EventId>,
}

impl CookieSettings {
    fn build(
        &self,
        name: &'static str,
        value: String,
        path: &'static str,
        http_only: bool,
    ) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .path(path)
            .http_only(http_only)
            .secure(self.secure)
            .same_site(self.same_site)
            .build();
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    /// Access token cookie.
    #[must_use]
    pub fn access(&self, token: &IssuedToken, persistent: bool) -> Cookie<'static> {
        let mut cookie = self.build(ACCESS_COOKIE, token.token.clone(), "/", true);
        if persistent {
            cookie.set_max_age(max_age(token.ttl()));
        }
        cookie
    }

    /// Refresh token cookie. Always persistent.
    #[must_use]
    pub fn refresh(&self, token: &IssuedToken) -> Cookie<'static> {
        let mut cookie = self.build(REFRESH_COOKIE, token.token.clone(), REFRESH_COOKIE_PATH, true);
        cookie.set_max_age(max_age(token.ttl()));
        cookie
    }

    /// UI hint cookie.
    #[must_use]
    pub fn hint(&self, summary: &AccountSummary, lifetime: Option<chrono::Duration>) -> Cookie<'static> {
        let hint = UiHint {
            role: summary.role,
            assigned_event_id: summary.assigned_event_id,
        };
        let value = serde_json::to_vec(&hint)
            .map(|json| URL_SAFE_NO_PAD.encode(json))
            .unwrap_or_default();
        let mut cookie = self.build(HINT_COOKIE, value, "/", false);
        if let Some(lifetime) = lifetime {
            cookie.set_max_age(max_age(lifetime));
        }
        cookie
    }

    /// Add the cookies of a successful login or refresh to `jar`.
    #[must_use]
    pub fn set_login(&self, jar: CookieJar, success: &LoginSuccess) -> CookieJar {
        let persistent = success.remember_me;
        let jar = jar
            .add(self.access(&success.access, persistent))
            .add(self.hint(&success.summary, persistent.then(|| success.access.ttl())));
        match &success.refresh {
            Some(refresh) => jar.add(self.refresh(refresh)),
            None => jar.remove(self.removal(REFRESH_COOKIE, REFRESH_COOKIE_PATH)),
        }
    }

    /// Remove every credential cookie from the client.
    #[must_use]
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(self.removal(ACCESS_COOKIE, "/"))
            .remove(self.removal(REFRESH_COOKIE, REFRESH_COOKIE_PATH))
            .remove(self.removal(HINT_COOKIE, "/"))
    }

    fn removal(&self, name: &'static str, path: &'static str) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, "")).path(path).build();
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }
}

fn max_age(lifetime: chrono::Duration) -> time::Duration {
    time::Duration::seconds(lifetime.num_seconds().max(0))
}

/// Access token presented with a request.
#[must_use]
pub fn access_token(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_COOKIE).map(|c| c.value().to_string())
}

/// Refresh token presented with a request.
#[must_use]
pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE).map(|c| c.value().to_string())
}
