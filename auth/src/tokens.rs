//! Signed session tokens.
//!
//! Tokens are HS256 JWTs. Access tokens carry the role and assigned event;
//! refresh tokens only carry the subject and can do nothing but mint a new
//! access token. Every token has a unique `jti`; its SHA-256 fingerprint is
//! what the session registry stores.
//!
//! Expiry is checked here against the injected [`Clock`] rather than by
//! `jsonwebtoken`, so that tests control time and the leeway is applied in
//! one place.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::providers::Clock;
use crate::state::{AccountId, EventId, Role, TokenFingerprint, TokenKind};

/// Why a token failed verification.
///
/// Callers outside this crate treat every variant the same way; the
/// distinction exists for logs and tests.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Past its expiry (plus leeway).
    #[error("token expired")]
    Expired,

    /// Signature does not match.
    #[error("bad signature")]
    BadSignature,

    /// Not a well-formed token from this issuer.
    #[error("malformed token")]
    Malformed,

    /// A refresh token presented as an access token, or vice versa.
    #[error("wrong token kind")]
    WrongKind,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::BadSignature,
            _ => Self::Malformed,
        }
    }
}

/// Verified access token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject.
    pub account_id: AccountId,
    /// Role at issue time.
    pub role: Role,
    /// Assigned event at issue time.
    pub assigned_event_id: Option<EventId>,
    /// Issued-at, unix seconds.
    pub issued_at: i64,
    /// Expiry, unix seconds.
    pub expires_at: i64,
    /// Unique token ID.
    pub jti: String,
}

impl AccessClaims {
    /// Session fingerprint for this token.
    #[must_use]
    pub fn fingerprint(&self) -> TokenFingerprint {
        TokenFingerprint::of_jti(&self.jti)
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expiry(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Verified refresh token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Subject.
    pub account_id: AccountId,
    /// Issued-at, unix seconds.
    pub issued_at: i64,
    /// Expiry, unix seconds.
    pub expires_at: i64,
    /// Unique token ID.
    pub jti: String,
}

impl RefreshClaims {
    /// Session fingerprint for this token.
    #[must_use]
    pub fn fingerprint(&self) -> TokenFingerprint {
        TokenFingerprint::of_jti(&self.jti)
    }
}

/// Wire format shared by both token kinds.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: AccountId,
    iss: String,
    iat: i64,
    exp: i64,
    jti: String,
    kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evt: Option<EventId>,
}

/// A freshly minted token.
#[derive(Clone)]
pub struct IssuedToken {
    /// Encoded JWT, to be handed to the client.
    pub token: String,
    /// Unique token ID.
    pub jti: String,
    /// Fingerprint to persist.
    pub fingerprint: TokenFingerprint,
    /// Token class.
    pub kind: TokenKind,
    /// Issue time (whole seconds).
    pub issued_at: DateTime<Utc>,
    /// Expiry (whole seconds).
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Lifetime left at issue time.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.expires_at - self.issued_at
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("fingerprint", &self.fingerprint.short())
            .field("kind", &self.kind)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Issues and verifies tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    leeway: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service from configuration.
    #[must_use]
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let secret = config.signing_secret.expose_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            leeway: config.leeway,
            clock,
        }
    }

    /// Mint an access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if encoding fails.
    pub fn issue_access(
        &self,
        account_id: AccountId,
        role: Role,
        assigned_event_id: Option<EventId>,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        self.issue(account_id, TokenKind::Access, Some(role), assigned_event_id, ttl)
    }

    /// Mint a refresh token. It carries no role and no event.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if encoding fails.
    pub fn issue_refresh(&self, account_id: AccountId, ttl: Duration) -> Result<IssuedToken> {
        self.issue(account_id, TokenKind::Refresh, None, None, ttl)
    }

    fn issue(
        &self,
        account_id: AccountId,
        kind: TokenKind,
        role: Option<Role>,
        evt: Option<EventId>,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = self.clock.now();
        let iat = now.timestamp();
        let exp = iat + ttl.num_seconds();
        let jti = uuid::Uuid::new_v4().to_string();

        let claims = WireClaims {
            sub: account_id,
            iss: self.issuer.clone(),
            iat,
            exp,
            jti: jti.clone(),
            kind,
            role,
            evt,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(format!("Token encoding failed: {e}")))?;

        Ok(IssuedToken {
            token,
            fingerprint: TokenFingerprint::of_jti(&jti),
            jti,
            kind,
            issued_at: DateTime::from_timestamp(iat, 0).unwrap_or(now),
            expires_at: DateTime::from_timestamp(exp, 0).unwrap_or(now + ttl),
        })
    }

    /// Verify an access token, including expiry.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] describing the failure.
    pub fn verify_access(&self, token: &str) -> std::result::Result<AccessClaims, TokenError> {
        let claims = self.decode(token, TokenKind::Access)?;
        self.check_expiry(claims.exp)?;
        into_access(claims)
    }

    /// Verify an access token's signature and shape, ignoring expiry.
    ///
    /// Used by logout, so that an expired token can still end its session.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] describing the failure.
    pub fn inspect_access(&self, token: &str) -> std::result::Result<AccessClaims, TokenError> {
        into_access(self.decode(token, TokenKind::Access)?)
    }

    /// Verify a refresh token, including expiry.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] describing the failure.
    pub fn verify_refresh(&self, token: &str) -> std::result::Result<RefreshClaims, TokenError> {
        let claims = self.decode(token, TokenKind::Refresh)?;
        self.check_expiry(claims.exp)?;
        Ok(RefreshClaims {
            account_id: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
            jti: claims.jti,
        })
    }

    /// Verify a refresh token's signature and shape, ignoring expiry.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] describing the failure.
    pub fn inspect_refresh(&self, token: &str) -> std::result::Result<RefreshClaims, TokenError> {
        let claims = self.decode(token, TokenKind::Refresh)?;
        Ok(RefreshClaims {
            account_id: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
            jti: claims.jti,
        })
    }

    fn decode(&self, token: &str, expected: TokenKind) -> std::result::Result<WireClaims, TokenError> {
        let data = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.validation)?;
        if data.claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }

    fn check_expiry(&self, exp: i64) -> std::result::Result<(), TokenError> {
        if self.clock.now().timestamp() > exp.saturating_add(self.leeway.num_seconds()) {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}

fn into_access(claims: WireClaims) -> std::result::Result<AccessClaims, TokenError> {
    let role = claims.role.ok_or(TokenError::Malformed)?;
    Ok(AccessClaims {
        account_id: claims.sub,
        role,
        assigned_event_id: claims.evt,
        issued_at: claims.iat,
        expires_at: claims.exp,
        jti: claims.jti,
    })
}
