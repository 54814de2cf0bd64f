//! `PostgreSQL` storage implementations.
//!
//! All statements are parameterized. Schema lives in `auth/migrations`.
//!
//! # Example
//!
//! ```no_run
//! use paddock_auth::stores::postgres::{self, PostgresAccountStore};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/paddock").await?;
//! postgres::migrate(&pool).await?;
//! let accounts = PostgresAccountStore::new(pool);
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod attempts;
pub mod session;

pub use account::PostgresAccountStore;
pub use attempts::PostgresAttemptStore;
pub use session::PostgresSessionStore;

use crate::error::{AuthError, Result};
use sqlx::PgPool;

/// Run the auth schema migrations.
///
/// # Errors
///
/// Returns error if migrations fail.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AuthError::InternalError(format!("Migration failed: {e}")))?;
    Ok(())
}

/// Map a database error. Anything but a constraint violation is treated as
/// the store being unavailable.
fn db_error(context: &str, error: &sqlx::Error) -> AuthError {
    tracing::error!(context, error = %error, "Database error");
    AuthError::StoreUnavailable(format!("{context}: {error}"))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}
