use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::config::DatabaseSettings;

use super::MIGRATION_001_INITIAL;

/// A database transaction spanning every read and write of one business operation.
/// Dropping it without `commit` rolls the operation back.
pub type UnitOfWork = Transaction<'static, Sqlite>;

/// Handle to the dealership database. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing database file.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        Self::open(settings, false).await
    }

    /// Create the database file if needed and bring the schema up to date.
    pub async fn init(settings: &DatabaseSettings) -> Result<Self> {
        let repo = Self::open(settings, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn open(settings: &DatabaseSettings, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&settings.path)
            .create_if_missing(create)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(settings.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at {}", settings.path))?;

        tracing::debug!(path = %settings.path, create, "database pool ready");
        Ok(Self::new(pool))
    }

    /// Run database migrations. Every statement is idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Open a unit of work for a mutating operation.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    /// Borrow a pooled connection for read-only queries.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire database connection")
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Commit a unit of work, attaching the operation name to any failure.
pub async fn commit(tx: UnitOfWork, operation: &'static str) -> Result<()> {
    tx.commit()
        .await
        .with_context(|| format!("Failed to commit {operation}"))
}
