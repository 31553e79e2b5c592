// SQLite PersistentStore Implementation

use async_trait::async_trait;
use deferq_core::error::{AppError, Result};
use deferq_core::port::{PersistentStore, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some("5") => {
                AppError::Store(format!("Database locked (SQLITE_BUSY): {}", db_err.message()))
            }
            Some("13") => AppError::Store(format!("Database full: {}", db_err.message())),
            Some(code) => AppError::Store(format!(
                "Database error [{}]: {}",
                code,
                db_err.message()
            )),
            None => AppError::Store(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::PoolTimedOut => AppError::Store("Connection pool timed out".to_string()),
        _ => AppError::Store(err.to_string()),
    }
}

/// Key/value store on the `kv_store` table
///
/// Each `set` replaces the whole value for the key in one statement, so a
/// reader never sees a partially written snapshot.
pub struct SqliteStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// When `key` was last written (epoch ms)
    pub async fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT updated_at FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(key = %key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(key = %key, removed = result.rows_affected(), "Removed value");
        Ok(())
    }
}
