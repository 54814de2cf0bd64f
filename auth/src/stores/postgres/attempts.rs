//! `PostgreSQL` login attempt store.
//!
//! The failure increment and the lock decision are one
//! `INSERT ... ON CONFLICT DO UPDATE ... RETURNING` statement. Postgres
//! serializes concurrent upserts on the same key, so no increment is lost.

use super::db_error;
use crate::config::ThrottlePolicy;
use crate::error::Result;
use crate::providers::AttemptStore;
use crate::state::AttemptRecord;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// `PostgreSQL` login attempt store.
#[derive(Clone)]
pub struct PostgresAttemptStore {
    /// `PostgreSQL` connection pool.
    pool: PgPool,
}

impl PostgresAttemptStore {
    /// Create a new `PostgreSQL` attempt store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    key: String,
    failure_count: i32,
    window_started_at: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

impl From<AttemptRow> for AttemptRecord {
    fn from(row: AttemptRow) -> Self {
        Self {
            key: row.key,
            failure_count: u32::try_from(row.failure_count).unwrap_or(0),
            window_started_at: row.window_started_at,
            locked_until: row.locked_until,
        }
    }
}

// $1 key, $2 now, $3 now - window, $4 max failures, $5 now + lockout.
//
// A row "continues" while its lock is active, or, without a lock, while its
// window is open. Otherwise the failure starts a fresh window.
const INCREMENT_FAILURE: &str = r"
INSERT INTO login_attempts AS a (key, failure_count, window_started_at, locked_until, updated_at)
VALUES ($1, 1, $2, CASE WHEN 1 >= $4 THEN $5 ELSE NULL END, $2)
ON CONFLICT (key) DO UPDATE SET
    failure_count = CASE
        WHEN (a.locked_until IS NOT NULL AND a.locked_until > $2)
          OR (a.locked_until IS NULL AND a.window_started_at > $3)
        THEN a.failure_count + 1
        ELSE 1
    END,
    window_started_at = CASE
        WHEN (a.locked_until IS NOT NULL AND a.locked_until > $2)
          OR (a.locked_until IS NULL AND a.window_started_at > $3)
        THEN a.window_started_at
        ELSE $2
    END,
    locked_until = CASE
        WHEN a.locked_until IS NOT NULL AND a.locked_until > $2 THEN a.locked_until
        WHEN a.locked_until IS NULL AND a.window_started_at > $3 AND a.failure_count + 1 >= $4 THEN $5
        WHEN 1 >= $4 THEN $5
        ELSE NULL
    END,
    updated_at = $2
RETURNING key, failure_count, window_started_at, locked_until
";

impl AttemptStore for PostgresAttemptStore {
    async fn increment_failure(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &ThrottlePolicy,
    ) -> Result<AttemptRecord> {
        let threshold = i32::try_from(policy.max_failures).unwrap_or(i32::MAX);
        let row = sqlx::query_as::<_, AttemptRow>(INCREMENT_FAILURE)
            .bind(key)
            .bind(now)
            .bind(now - policy.window)
            .bind(threshold)
            .bind(now + policy.lockout)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("increment login failure", &e))?;

        Ok(row.into())
    }

    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>> {
        let row = sqlx::query_as::<_, AttemptRow>(
            "SELECT key, failure_count, window_started_at, locked_until
             FROM login_attempts WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get login attempts", &e))?;

        Ok(row.map(AttemptRecord::from))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM login_attempts WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("reset login attempts", &e))?;

        Ok(())
    }

    async fn delete_stale(&self, now: DateTime<Utc>, window_cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM login_attempts
             WHERE (locked_until IS NULL OR locked_until <= $1)
               AND window_started_at <= $2",
        )
        .bind(now)
        .bind(window_cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("delete stale login attempts", &e))?;

        Ok(result.rows_affected())
    }
}
