//! `PostgreSQL` account store.

use super::{db_error, is_unique_violation};
use crate::error::{AuthError, Result};
use crate::providers::AccountStore;
use crate::state::{Account, AccountId, EventId, NewAccount, Role};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// `PostgreSQL` account store.
#[derive(Clone)]
pub struct PostgresAccountStore {
    /// `PostgreSQL` connection pool.
    pool: PgPool,
}

impl PostgresAccountStore {
    /// Create a new `PostgreSQL` account store.
    ///
    /// # Arguments
    ///
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: uuid::Uuid,
    email: String,
    password_hash: String,
    display_name: String,
    role: String,
    assigned_event_id: Option<i64>,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = AuthError;

    fn try_from(row: AccountRow) -> Result<Self> {
        let role: Role = row
            .role
            .parse()
            .map_err(|_| AuthError::InternalError(format!("Unknown role in database: {}", row.role)))?;
        Ok(Self {
            id: AccountId(row.id),
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            role,
            assigned_event_id: row.assigned_event_id.map(EventId),
            is_active: row.is_active,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, display_name, role, assigned_event_id, \
                               is_active, created_at, last_login_at";

impl AccountStore for PostgresAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find account by email", &e))?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find account by id", &e))?;

        row.map(Account::try_from).transpose()
    }

    async fn insert(&self, account: &NewAccount) -> Result<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts (id, email, password_hash, display_name, role, assigned_event_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(AccountId::new().0)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.display_name)
        .bind(account.role.as_str())
        .bind(account.assigned_event_id.map(|e| e.0))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailTaken
            } else {
                db_error("insert account", &e)
            }
        })?;

        Account::try_from(row)
    }

    async fn update_password_hash(&self, id: AccountId, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET password_hash = $2 WHERE id = $1")
            .bind(id.0)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update password hash", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET is_active = $2 WHERE id = $1")
            .bind(id.0)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("set account active", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: AccountId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE accounts SET last_login_at = $2 WHERE id = $1")
            .bind(id.0)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("record login", &e))?;

        Ok(())
    }
}
