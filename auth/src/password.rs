//! Password hashing with Argon2id.
//!
//! Hashes are PHC strings that embed their own algorithm, version, salt and
//! cost parameters. Verification reads the parameters back from the string,
//! so raising [`HashCost`] later never invalidates stored hashes; the login
//! flow upgrades them through [`PasswordHasher::needs_rehash`].
//!
//! Hashing is CPU-bound and deliberately slow. The async entry points run it
//! on the blocking thread pool.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use std::sync::{Arc, OnceLock};

use crate::config::HashCost;
use crate::error::{AuthError, Result};

/// Longest password accepted, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// Argon2id password hasher.
///
/// Cheap to clone; clones share the lazily computed dummy hash.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy_hash: Arc<OnceLock<String>>,
}

impl PasswordHasher {
    /// Create a hasher producing hashes at `cost`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if Argon2 rejects the parameters.
    pub fn new(cost: HashCost) -> Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::InternalError(format!("Invalid Argon2 parameters: {e}")))?;
        Ok(Self {
            params,
            dummy_hash: Arc::new(OnceLock::new()),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `plaintext` on the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if hashing fails.
    pub fn hash_blocking(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::InternalError(format!("Password hashing failed: {e}")))
    }

    /// Verify `plaintext` against a stored PHC string on the current thread.
    ///
    /// Any parse or verification problem yields `false`; the reason is never
    /// surfaced.
    #[must_use]
    pub fn verify_blocking(plaintext: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("Stored password hash is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Hash `plaintext` on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if hashing fails or the task
    /// panics.
    pub async fn hash(&self, plaintext: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&plaintext))
            .await
            .map_err(|e| AuthError::InternalError(format!("Hashing task failed: {e}")))?
    }

    /// Verify `plaintext` against `hash` on the blocking pool.
    pub async fn verify(&self, plaintext: String, hash: String) -> bool {
        tokio::task::spawn_blocking(move || Self::verify_blocking(&plaintext, &hash))
            .await
            .unwrap_or(false)
    }

    /// Spend the same work as a real verification, for unknown identifiers.
    ///
    /// Keeps "no such account" indistinguishable by timing from "wrong
    /// password".
    pub async fn verify_dummy(&self, plaintext: String) {
        let hasher = self.clone();
        let _ = tokio::task::spawn_blocking(move || {
            let dummy = hasher
                .dummy_hash
                .get_or_init(|| hasher.hash_blocking("paddock-dummy-password").unwrap_or_default());
            Self::verify_blocking(&plaintext, dummy)
        })
        .await;
    }

    /// Returns `true` if `hash` was not produced with the current algorithm
    /// and cost, and should be replaced after a successful login.
    #[must_use]
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };
        if parsed.algorithm != Algorithm::Argon2id.ident()
            || parsed.version != Some(Version::V0x13.into())
        {
            return true;
        }
        Params::try_from(&parsed).map_or(true, |stored| {
            stored.m_cost() != self.params.m_cost()
                || stored.t_cost() != self.params.t_cost()
                || stored.p_cost() != self.params.p_cost()
        })
    }
}

/// Check a new password against the length policy.
///
/// # Errors
///
/// Returns [`AuthError::WeakPassword`] if shorter than `min_length`
/// characters, or [`AuthError::InvalidInput`] if longer than
/// [`MAX_PASSWORD_BYTES`].
pub fn validate_strength(password: &str, min_length: usize) -> Result<()> {
    if password.chars().count() < min_length {
        return Err(AuthError::WeakPassword { min_length });
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidInput("Password too long".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::WeakPassword { min_length });
    }
    Ok(())
}
