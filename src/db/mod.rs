//! Database module for authdb.
//!
//! This module provides the SQLite connection pool, migration management,
//! and the two stores that own all persistent state.

mod account;
mod credential_store;
mod reset_token;
mod schema;

pub use account::{Account, AccountStatus};
pub use credential_store::CredentialStore;
pub use reset_token::{ResetToken, ResetTokenStore};
pub use schema::MIGRATIONS;

use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::{AuthDbError, Result};

/// Database wrapper owning the SQLite pool.
///
/// Connections and transactions are checked out per request and returned to
/// the pool when dropped, on success and error paths alike. A transaction
/// dropped without `commit` is rolled back.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl Database {
    /// Open (or create) the database described by `config` and apply migrations.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let path = Path::new(&config.path);
        info!(path = ?path, "Opening database");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| AuthDbError::DatabaseConnection(e.to_string()))?;

        let db = Self {
            pool,
            operation_timeout: config.operation_timeout(),
        };
        db.migrate().await?;

        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// The pool holds exactly one connection that never expires, since the
    /// in-memory database lives only as long as that connection.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let defaults = DatabaseConfig::default();
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(defaults.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| AuthDbError::DatabaseConnection(e.to_string()))?;

        let db = Self {
            pool,
            operation_timeout: defaults.operation_timeout(),
        };
        db.migrate().await?;

        Ok(db)
    }

    /// Replace the bound applied by [`Database::bounded`].
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a new transaction on a pooled connection.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Run one storage unit under the configured time bound.
    ///
    /// On timeout the future is dropped, which rolls back any transaction
    /// it had open, and `AuthDbError::Timeout` is returned.
    pub async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AuthDbError::Timeout(
                self.operation_timeout.as_millis() as u64,
            )),
        }
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        if !self.table_exists("schema_version").await? {
            return Ok(0);
        }

        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;

        Ok(version)
    }

    /// Apply pending migrations, each in its own transaction.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;

        if current_version as usize >= MIGRATIONS.len() {
            debug!(version = current_version, "Database is up to date");
            return Ok(());
        }

        info!(
            from = current_version,
            to = MIGRATIONS.len(),
            "Migrating database"
        );

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            let mut tx = self.pool.begin().await?;

            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(version)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            debug!(version, "Migration applied");
        }

        info!(version = MIGRATIONS.len(), "Database migration complete");
        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_tables_exist() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.table_exists("accounts").await.unwrap());
        assert!(db.table_exists("pw_reset").await.unwrap());
        assert!(db.table_exists("schema_version").await.unwrap());
        assert!(!db.table_exists("users").await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory().await.unwrap();
        let fk_enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[tokio::test]
    async fn test_status_check_constraint() {
        let db = Database::open_in_memory().await.unwrap();
        let result = sqlx::query("INSERT INTO accounts (identifier, status) VALUES (?, ?)")
            .bind("a@x.com")
            .bind("locked")
            .execute(db.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_transaction_rollback_on_drop() {
        let db = Database::open_in_memory().await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query("INSERT INTO accounts (identifier, password_hash) VALUES (?, ?)")
                .bind("rollback@x.com")
                .bind("hash")
                .execute(&mut *tx)
                .await
                .unwrap();
            // Dropped without commit
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let db = Database::open_in_memory()
            .await
            .unwrap()
            .with_operation_timeout(Duration::from_millis(20));

        let result: Result<()> = db
            .bounded(async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AuthDbError::Timeout(20))));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let db = Database::open_in_memory().await.unwrap();
        let value = db.bounded(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_open_file_database_migrates_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested/auth.db").to_string_lossy().into_owned(),
            ..DatabaseConfig::default()
        };

        {
            let db = Database::open(&config).await.unwrap();
            sqlx::query("INSERT INTO accounts (identifier, password_hash) VALUES (?, ?)")
                .bind("persist@x.com")
                .bind("hash")
                .execute(db.pool())
                .await
                .unwrap();
            db.close().await;
        }

        let db = Database::open(&config).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
