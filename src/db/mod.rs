mod mappers;
mod read_ops;
mod write_ops;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::error::{LucidError, Result};

pub use write_ops::{classify_failure_category, redact_sensitive, LEASE_EXPIRED_ERROR};

/// Handle over the relational store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct LucidDb {
    pool: SqlitePool,
}

impl LucidDb {
    /// Connect to a file-backed database, creating it if missing.
    ///
    /// # Errors
    /// Returns `ConfigError` for an unparseable URL and a database error if the
    /// pool cannot connect.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| LucidError::ConfigError(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(max_connections, "Connected to lucid database");
        Ok(Self { pool })
    }

    /// Fresh migrated in-memory database on a single pinned connection.
    ///
    /// # Errors
    /// Returns an error if the connection or the migrations fail.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| LucidError::ConfigError(format!("Invalid database URL: {e}")))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Create a new `LucidDb` with an existing pool (for testing).
    #[must_use]
    pub const fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to begin tx: {e}")))
    }
}

async fn commit(tx: Transaction<'static, Sqlite>) -> Result<()> {
    tx.commit()
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to commit tx: {e}")))
}
