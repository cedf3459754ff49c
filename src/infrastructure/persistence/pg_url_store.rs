//! PostgreSQL implementation of the URL store.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::domain::entities::UrlMapping;
use crate::domain::repositories::{StoreError, UrlStore};

/// SQLSTATE codes that signal a retryable server-side condition:
/// serialization failure, deadlock, admin shutdown, cannot connect now.
const TRANSIENT_SQLSTATES: &[&str] = &["40001", "40P01", "57P01", "57P03"];

/// PostgreSQL store backed by the `urls` table:
///
/// ```sql
/// CREATE TABLE urls (
///     short_url TEXT PRIMARY KEY,
///     long_url  TEXT UNIQUE NOT NULL
/// );
/// ```
pub struct PgUrlStore {
    pool: Arc<PgPool>,
}

impl PgUrlStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

/// Maps a driver error onto the store's retry classification.
pub fn classify_sqlx_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                return StoreError::Conflict(
                    db.constraint().unwrap_or("unique constraint").to_string(),
                );
            }
            if db
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&&*code))
            {
                return StoreError::Unavailable(db.to_string());
            }
            StoreError::Query(db.to_string())
        }
        other => {
            error!("Unexpected database error: {}", other);
            StoreError::Query(other.to_string())
        }
    }
}

#[async_trait]
impl UrlStore for PgUrlStore {
    async fn find_long_url(&self, short_url: &str) -> Result<String, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT long_url FROM urls WHERE short_url = $1")
            .bind(short_url)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(classify_sqlx_error)
    }

    async fn create(&self, mapping: UrlMapping) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO urls (short_url, long_url) VALUES ($1, $2)")
            .bind(&mapping.short_url)
            .bind(&mapping.long_url)
            .execute(self.pool.as_ref())
            .await
            .map_err(classify_sqlx_error)?;

        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
