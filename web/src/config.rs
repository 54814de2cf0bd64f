//! Server configuration.
//!
//! Read from environment variables (after `.env` is loaded by the binary):
//!
//! | variable                        | default        |
//! |---------------------------------|----------------|
//! | `DATABASE_URL`                  | required       |
//! | `PADDOCK_BIND_ADDR`             | `0.0.0.0:8080` |
//! | `PADDOCK_DB_MAX_CONNECTIONS`    | `10`           |
//! | `PADDOCK_DB_ACQUIRE_TIMEOUT_MS` | `3000`         |
//! | `PADDOCK_COOKIE_SECURE`         | `true`         |
//! | `PADDOCK_COOKIE_SAMESITE`       | `lax`          |
//! | `PADDOCK_COOKIE_DOMAIN`         | host-only      |
//! | `PADDOCK_LOGIN_PATH`            | `/login`       |
//! | `PADDOCK_TRUSTED_PROXIES`       | none           |
//!
//! Auth settings are read separately by [`paddock_auth::AuthConfig::from_env`].

use axum_extra::extract::cookie::SameSite;
use paddock_auth::ConfigError;
use secrecy::SecretString;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::cookies::CookieSettings;
use crate::extractors::TrustedProxies;

/// Default login page, the target of every gate redirect to login.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// HTTP server configuration.
#[derive(Debug)]
pub struct WebConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// Postgres connection string.
    pub database_url: SecretString,
    /// Pool size.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// Credential cookie attributes.
    pub cookies: CookieSettings,
    /// Login page path.
    pub login_path: String,
    /// Reverse proxies whose `X-Forwarded-For` is believed.
    pub trusted_proxies: TrustedProxies,
}

impl WebConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a missing database URL or an
    /// unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a missing database URL or an
    /// unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = parse(&lookup, "PADDOCK_BIND_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));
        let max_connections = parse(&lookup, "PADDOCK_DB_MAX_CONNECTIONS")?.unwrap_or(10);
        let acquire_timeout =
            Duration::from_millis(parse(&lookup, "PADDOCK_DB_ACQUIRE_TIMEOUT_MS")?.unwrap_or(3000));

        let mut cookies = CookieSettings::default();
        if let Some(secure) = parse::<bool, _>(&lookup, "PADDOCK_COOKIE_SECURE")? {
            cookies.secure = secure;
        }
        if let Some(same_site) = lookup("PADDOCK_COOKIE_SAMESITE") {
            cookies.same_site = match same_site.trim().to_ascii_lowercase().as_str() {
                "lax" => SameSite::Lax,
                "strict" => SameSite::Strict,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "PADDOCK_COOKIE_SAMESITE",
                        reason: format!("expected 'lax' or 'strict', got '{other}'"),
                    });
                }
            };
        }
        cookies.domain = lookup("PADDOCK_COOKIE_DOMAIN").filter(|d| !d.trim().is_empty());

        let login_path = lookup("PADDOCK_LOGIN_PATH").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        if !login_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "PADDOCK_LOGIN_PATH",
                reason: "must start with '/'".to_string(),
            });
        }

        let trusted_proxies = match lookup("PADDOCK_TRUSTED_PROXIES") {
            Some(raw) => TrustedProxies::new(
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| {
                        p.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                            key: "PADDOCK_TRUSTED_PROXIES",
                            reason: format!("'{p}': {e}"),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => TrustedProxies::default(),
        };

        Ok(Self {
            bind_addr,
            database_url: SecretString::from(database_url),
            max_connections,
            acquire_timeout,
            cookies,
            login_path,
            trusted_proxies,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}
