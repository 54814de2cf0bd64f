//! Login flow and account administration.
//!
//! [`AuthService`] wires the password hasher, login throttle, token service,
//! session registry and authorization gate together over the three stores.
//!
//! # Login
//!
//! ```text
//! normalize email ─► throttle locked? ──yes──► AccountLocked
//!                          │ no
//!                          ▼
//!                    find account ──none──► dummy verify, count failure ─► InvalidCredentials
//!                          │
//!                          ▼
//!                    verify password ──no──► count failure ─► InvalidCredentials
//!                          │
//!                          ▼
//!                    active? scope ok? ──no──► AccountInactive / MisconfiguredAccount
//!                          │
//!                          ▼
//!                    reset counter, rehash if needed, mint tokens, register sessions
//! ```

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::constants::metric_names;
use crate::error::{AuthError, Result};
use crate::gate::{AuthorizationGate, GateDecision};
use crate::password::{PasswordHasher, validate_strength};
use crate::providers::{AccountStore, AttemptStore, Clock, SessionStore};
use crate::registry::SessionRegistry;
use crate::state::{
    Account, AccountId, AccountSummary, DeviceMeta, EventId, NewAccount, Role, Session,
    SessionStatus, TokenKind, check_scope,
};
use crate::throttle::{LoginThrottle, account_key};
use crate::tokens::{IssuedToken, TokenService};
use crate::utils::{is_valid_email, normalize_email, with_timeout};

/// Credentials submitted to the login endpoint.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email address.
    pub identifier: String,
    /// Password.
    pub secret: String,
    /// Keep the credential cookies across browser restarts.
    #[serde(default)]
    pub remember_me: bool,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Result of a successful login or token refresh.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    /// `{accountId, role, assignedEventId}`.
    pub summary: AccountSummary,
    /// New access token.
    pub access: IssuedToken,
    /// New refresh token, issued when "remember me" was selected.
    pub refresh: Option<IssuedToken>,
    /// Whether the caller asked to be remembered.
    pub remember_me: bool,
}

/// Input for creating an admin account.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    /// Email address.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Display name.
    pub display_name: String,
    /// Role.
    pub role: Role,
    /// Assigned event, required for event-scoped roles.
    #[serde(default)]
    pub assigned_event_id: Option<EventId>,
}

impl fmt::Debug for CreateAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAccount")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("assigned_event_id", &self.assigned_event_id)
            .finish()
    }
}

/// Admin authentication service.
pub struct AuthService<A, S, T> {
    accounts: A,
    registry: SessionRegistry<S>,
    throttle: LoginThrottle<T>,
    tokens: TokenService,
    hasher: PasswordHasher,
    gate: AuthorizationGate<S>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl<A, S, T> AuthService<A, S, T>
where
    A: AccountStore,
    S: SessionStore + Clone + 'static,
    T: AttemptStore,
{
    /// Build the service over its stores.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if the configured hash cost is
    /// rejected by Argon2.
    pub fn new(
        config: AuthConfig,
        accounts: A,
        sessions: S,
        attempts: T,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let hasher = PasswordHasher::new(config.hash_cost)?;
        let tokens = TokenService::new(&config, Arc::clone(&clock));
        let registry = SessionRegistry::new(
            sessions,
            Arc::clone(&clock),
            config.store_timeout,
            config.touch_interval,
        )
        .with_leeway(config.leeway);
        let throttle = LoginThrottle::new(
            attempts,
            Arc::clone(&clock),
            config.store_timeout,
            config.account_throttle,
            config.ip_throttle,
        );
        let gate = AuthorizationGate::new(
            tokens.clone(),
            registry.clone(),
            config.protected_area.clone(),
        );

        Ok(Self {
            accounts,
            registry,
            throttle,
            tokens,
            hasher,
            gate,
            clock,
            config,
        })
    }

    /// Configuration in use.
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Token service.
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Session registry.
    pub const fn registry(&self) -> &SessionRegistry<S> {
        &self.registry
    }

    /// Login throttle.
    pub const fn throttle(&self) -> &LoginThrottle<T> {
        &self.throttle
    }

    /// Authorization gate.
    pub const fn gate(&self) -> &AuthorizationGate<S> {
        &self.gate
    }

    /// Run the authorization gate for a request.
    pub async fn authorize(&self, token: Option<&str>, path: &str) -> GateDecision {
        self.gate.check(token, path).await
    }

    // ═══════════════════════════════════════════════════════════════════
    // Login / Logout / Refresh
    // ═══════════════════════════════════════════════════════════════════

    /// Authenticate with email and password and open a session.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] for an unknown email or a wrong
    ///   password
    /// - [`AuthError::AccountLocked`] while the throttle is engaged, even
    ///   with the correct password
    /// - [`AuthError::AccountInactive`] / [`AuthError::MisconfiguredAccount`]
    ///   for accounts that may not sign in
    /// - [`AuthError::StoreUnavailable`] when a store fails or times out
    pub async fn login(&self, request: LoginRequest, device: DeviceMeta) -> Result<LoginSuccess> {
        let email = normalize_email(&request.identifier);
        let result = self
            .authenticate(&email, request.secret, request.remember_me, device)
            .await;

        match &result {
            Ok(success) => {
                metrics::counter!(metric_names::LOGINS).increment(1);
                tracing::info!(
                    account_id = %success.summary.account_id,
                    role = %success.summary.role,
                    "Login succeeded"
                );
            }
            Err(e) => {
                metrics::counter!(metric_names::LOGIN_FAILURES, "kind" => e.kind()).increment(1);
                if e.is_transient() {
                    tracing::error!(email = %email, error = %e, "Login failed on store error");
                } else {
                    tracing::warn!(email = %email, kind = e.kind(), "Login refused");
                }
            }
        }

        result
    }

    async fn authenticate(
        &self,
        email: &str,
        secret: String,
        remember_me: bool,
        device: DeviceMeta,
    ) -> Result<LoginSuccess> {
        if !is_valid_email(email) {
            self.hasher.verify_dummy(secret).await;
            return Err(AuthError::InvalidCredentials);
        }

        // Locked keys short-circuit before any hashing.
        if let Some(until) = self.throttle.login_lock(email, device.ip_address).await? {
            return Err(AuthError::AccountLocked { until });
        }

        let account = with_timeout(
            self.config.store_timeout,
            "accounts.find_by_email",
            self.accounts.find_by_email(email),
        )
        .await?;

        let Some(account) = account else {
            self.hasher.verify_dummy(secret).await;
            self.throttle
                .record_login_failure(email, device.ip_address)
                .await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .hasher
            .verify(secret.clone(), account.password_hash.clone())
            .await
        {
            let failures = self
                .throttle
                .record_login_failure(email, device.ip_address)
                .await?;
            tracing::debug!(account_id = %account.id, failures, "Wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AuthError::AccountInactive);
        }
        account.scope()?;

        self.throttle.record_success(&account_key(email)).await?;
        self.upgrade_hash(&account, secret).await;

        let success = self.open_session(&account, remember_me, &device).await?;

        let now = self.clock.now();
        if let Err(e) = with_timeout(
            self.config.store_timeout,
            "accounts.record_login",
            self.accounts.record_login(account.id, now),
        )
        .await
        {
            tracing::warn!(account_id = %account.id, error = %e, "Could not record login time");
        }

        Ok(success)
    }

    async fn upgrade_hash(&self, account: &Account, secret: String) {
        if !self.hasher.needs_rehash(&account.password_hash) {
            return;
        }
        let result: Result<bool> = async {
            let hash = self.hasher.hash(secret).await?;
            with_timeout(
                self.config.store_timeout,
                "accounts.update_password_hash",
                self.accounts.update_password_hash(account.id, &hash),
            )
            .await
        }
        .await;

        match result {
            Ok(_) => tracing::info!(account_id = %account.id, "Password hash upgraded"),
            Err(e) => tracing::warn!(account_id = %account.id, error = %e, "Password rehash skipped"),
        }
    }

    async fn open_session(
        &self,
        account: &Account,
        remember_me: bool,
        device: &DeviceMeta,
    ) -> Result<LoginSuccess> {
        let summary = account.summary();

        let access = self.tokens.issue_access(
            account.id,
            account.role,
            summary.assigned_event_id,
            self.config.access_ttl,
        )?;
        self.registry
            .register(account.id, &access, device.clone())
            .await?;

        let refresh = if remember_me {
            let refresh = self
                .tokens
                .issue_refresh(account.id, self.config.refresh_ttl)?;
            self.registry
                .register(account.id, &refresh, device.clone())
                .await?;
            Some(refresh)
        } else {
            None
        };

        Ok(LoginSuccess {
            summary,
            access,
            refresh,
            remember_me,
        })
    }

    /// End the sessions behind the presented tokens.
    ///
    /// Tokens that fail verification are ignored. An expired but otherwise
    /// valid access token still revokes its session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] when the store fails.
    pub async fn logout(&self, access: Option<&str>, refresh: Option<&str>) -> Result<()> {
        if let Some(claims) = access.and_then(|t| self.tokens.inspect_access(t).ok()) {
            self.registry
                .revoke_fingerprint(&claims.fingerprint())
                .await?;
            tracing::info!(account_id = %claims.account_id, "Logged out");
        }
        if let Some(claims) = refresh.and_then(|t| self.tokens.inspect_refresh(t).ok()) {
            self.registry
                .revoke_fingerprint(&claims.fingerprint())
                .await?;
        }
        Ok(())
    }

    /// Exchange a refresh token for a new access and refresh token.
    ///
    /// The presented refresh session is revoked; presenting it again fails.
    /// Role and assigned event are re-read from the account.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] if the token does not verify
    /// - [`AuthError::SessionRevoked`] / [`AuthError::SessionExpired`] /
    ///   [`AuthError::SessionNotFound`] if its session is not active
    /// - [`AuthError::AccountInactive`] / [`AuthError::MisconfiguredAccount`]
    /// - [`AuthError::StoreUnavailable`] when a store fails
    pub async fn refresh(&self, refresh_token: &str, device: DeviceMeta) -> Result<LoginSuccess> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let fingerprint = claims.fingerprint();

        let session = match self.registry.lookup(&fingerprint).await? {
            SessionStatus::Active(session) => session,
            status => {
                tracing::debug!(fingerprint = fingerprint.short(), ?status, "Refresh refused");
                return Err(status.as_error().unwrap_or(AuthError::SessionNotFound));
            }
        };
        if session.kind != TokenKind::Refresh || session.account_id != claims.account_id {
            return Err(AuthError::SessionNotFound);
        }

        let account = with_timeout(
            self.config.store_timeout,
            "accounts.find_by_id",
            self.accounts.find_by_id(claims.account_id),
        )
        .await?
        .ok_or(AuthError::SessionNotFound)?;

        if !account.is_active {
            self.registry.revoke_all(account.id).await?;
            return Err(AuthError::AccountInactive);
        }
        account.scope()?;

        // A concurrent refresh may already have rotated this session.
        if !self.registry.revoke(session.id).await? {
            return Err(AuthError::SessionRevoked);
        }

        self.open_session(&account, true, &device).await
    }

    // ═══════════════════════════════════════════════════════════════════
    // Account Administration
    // ═══════════════════════════════════════════════════════════════════

    /// Create an admin account.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] for a malformed email, or an
    ///   event-scoped role without an event
    /// - [`AuthError::WeakPassword`] for a short password
    /// - [`AuthError::EmailTaken`] if the email is registered
    pub async fn create_account(&self, request: CreateAccount) -> Result<Account> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidInput("Invalid email address".to_string()));
        }
        let display_name = request.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AuthError::InvalidInput("Display name is required".to_string()));
        }
        let assigned_event_id = check_scope(request.role, request.assigned_event_id).map_err(|_| {
            AuthError::InvalidInput(format!(
                "Role {} requires an assigned event",
                request.role
            ))
        })?;
        validate_strength(&request.password, self.config.min_password_length)?;

        let password_hash = self.hasher.hash(request.password).await?;
        let account = with_timeout(
            self.config.store_timeout,
            "accounts.insert",
            self.accounts.insert(&NewAccount {
                email,
                password_hash,
                display_name,
                role: request.role,
                assigned_event_id,
            }),
        )
        .await?;

        tracing::info!(
            account_id = %account.id,
            role = %account.role,
            assigned_event_id = ?account.assigned_event_id,
            "Account created"
        );
        Ok(account)
    }

    /// Change a password after verifying the current one, then end every
    /// session of the account. Returns the number of sessions revoked.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] if `current` is wrong
    /// - [`AuthError::WeakPassword`] for a short new password
    /// - [`AuthError::StoreUnavailable`] when a store fails
    pub async fn change_password(
        &self,
        account_id: AccountId,
        current: String,
        new_password: String,
    ) -> Result<u64> {
        validate_strength(&new_password, self.config.min_password_length)?;
        let account = self.require_account(account_id).await?;

        if !self.hasher.verify(current, account.password_hash).await {
            return Err(AuthError::InvalidCredentials);
        }

        self.replace_password(account_id, new_password).await
    }

    /// Administratively set a new password and end every session of the
    /// account. Returns the number of sessions revoked.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] if the account does not exist
    /// - [`AuthError::WeakPassword`] for a short new password
    /// - [`AuthError::StoreUnavailable`] when a store fails
    pub async fn reset_password(&self, account_id: AccountId, new_password: String) -> Result<u64> {
        validate_strength(&new_password, self.config.min_password_length)?;
        self.require_account(account_id).await?;
        self.replace_password(account_id, new_password).await
    }

    async fn replace_password(&self, account_id: AccountId, new_password: String) -> Result<u64> {
        let hash = self.hasher.hash(new_password).await?;
        with_timeout(
            self.config.store_timeout,
            "accounts.update_password_hash",
            self.accounts.update_password_hash(account_id, &hash),
        )
        .await?;
        let revoked = self.registry.revoke_all(account_id).await?;
        tracing::info!(account_id = %account_id, revoked, "Password changed");
        Ok(revoked)
    }

    /// Activate or deactivate an account. Deactivation ends every session.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] if the account does not exist
    /// - [`AuthError::StoreUnavailable`] when a store fails
    pub async fn set_account_active(&self, account_id: AccountId, active: bool) -> Result<()> {
        let found = with_timeout(
            self.config.store_timeout,
            "accounts.set_active",
            self.accounts.set_active(account_id, active),
        )
        .await?;
        if !found {
            return Err(AuthError::InvalidInput("Account not found".to_string()));
        }
        if !active {
            self.registry.revoke_all(account_id).await?;
        }
        tracing::info!(account_id = %account_id, active, "Account activation changed");
        Ok(())
    }

    /// Clear the login throttle for an email.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] when the store fails.
    pub async fn unlock_account(&self, email: &str) -> Result<()> {
        self.throttle.unlock(&account_key(email)).await
    }

    /// End every session of an account ("log out everywhere").
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] when the store fails.
    pub async fn revoke_all_sessions(&self, account_id: AccountId) -> Result<u64> {
        self.registry.revoke_all(account_id).await
    }

    /// Active sessions of an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] when the store fails.
    pub async fn active_sessions(&self, account_id: AccountId) -> Result<Vec<Session>> {
        self.registry.active_sessions(account_id).await
    }

    /// Delete expired session rows.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] when the store fails.
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.registry.purge_expired().await
    }

    /// Delete login attempt counters with no active lock and an elapsed
    /// window.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] when the store fails.
    pub async fn purge_stale_attempts(&self) -> Result<u64> {
        self.throttle.purge_stale().await
    }

    /// Look up an account by email.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] when the store fails.
    pub async fn find_account(&self, email: &str) -> Result<Option<Account>> {
        let email = normalize_email(email);
        with_timeout(
            self.config.store_timeout,
            "accounts.find_by_email",
            self.accounts.find_by_email(&email),
        )
        .await
    }

    async fn require_account(&self, account_id: AccountId) -> Result<Account> {
        with_timeout(
            self.config.store_timeout,
            "accounts.find_by_id",
            self.accounts.find_by_id(account_id),
        )
        .await?
        .ok_or_else(|| AuthError::InvalidInput("Account not found".to_string()))
    }
}
