//! `PostgreSQL` session store.

use super::db_error;
use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{AccountId, DeviceMeta, Session, SessionId, TokenFingerprint, TokenKind};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// `PostgreSQL` session store.
///
/// One row per issued token, unique on `token_fingerprint`.
#[derive(Clone)]
pub struct PostgresSessionStore {
    /// `PostgreSQL` connection pool.
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Create a new `PostgreSQL` session store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: uuid::Uuid,
    account_id: uuid::Uuid,
    token_fingerprint: String,
    token_kind: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    device_type: String,
    is_active: bool,
}

impl TryFrom<SessionRow> for Session {
    type Error = AuthError;

    fn try_from(row: SessionRow) -> Result<Self> {
        let kind: TokenKind = row.token_kind.parse().map_err(|_| {
            AuthError::InternalError(format!("Unknown token kind in database: {}", row.token_kind))
        })?;
        Ok(Self {
            id: SessionId(row.id),
            account_id: AccountId(row.account_id),
            fingerprint: TokenFingerprint::from_stored(row.token_fingerprint),
            kind,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            last_activity_at: row.last_activity_at,
            device: DeviceMeta {
                ip_address: row.ip_address.and_then(|ip| ip.parse().ok()),
                user_agent: row.user_agent,
                device_type: row.device_type,
            },
            is_active: row.is_active,
        })
    }
}

const SESSION_COLUMNS: &str = "id, account_id, token_fingerprint, token_kind, issued_at, expires_at, \
                               last_activity_at, ip_address, user_agent, device_type, is_active";

impl SessionStore for PostgresSessionStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions
                (id, account_id, token_fingerprint, token_kind, issued_at, expires_at,
                 last_activity_at, ip_address, user_agent, device_type, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(session.id.0)
        .bind(session.account_id.0)
        .bind(session.fingerprint.as_str())
        .bind(session.kind.as_str())
        .bind(session.issued_at)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .bind(session.device.ip_address.map(|ip| ip.to_string()))
        .bind(session.device.user_agent.as_deref())
        .bind(&session.device.device_type)
        .bind(session.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert session", &e))?;

        Ok(())
    }

    async fn find_by_fingerprint(&self, fingerprint: &TokenFingerprint) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token_fingerprint = $1"
        ))
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find session", &e))?;

        row.map(Session::try_from).transpose()
    }

    async fn touch(&self, id: SessionId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET last_activity_at = GREATEST(last_activity_at, $2)
             WHERE id = $1 AND is_active",
        )
        .bind(id.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("touch session", &e))?;

        Ok(())
    }

    async fn revoke(&self, id: SessionId) -> Result<bool> {
        let result = sqlx::query("UPDATE sessions SET is_active = FALSE WHERE id = $1 AND is_active")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("revoke session", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_by_fingerprint(&self, fingerprint: &TokenFingerprint) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = FALSE WHERE token_fingerprint = $1 AND is_active",
        )
        .bind(fingerprint.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("revoke session by fingerprint", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all(&self, account_id: AccountId) -> Result<u64> {
        let result =
            sqlx::query("UPDATE sessions SET is_active = FALSE WHERE account_id = $1 AND is_active")
                .bind(account_id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("revoke all sessions", &e))?;

        Ok(result.rows_affected())
    }

    async fn list_active(&self, account_id: AccountId, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE account_id = $1 AND is_active AND expires_at > $2
             ORDER BY issued_at DESC"
        ))
        .bind(account_id.0)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list active sessions", &e))?;

        rows.into_iter().map(Session::try_from).collect()
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete expired sessions", &e))?;

        Ok(result.rows_affected())
    }
}
