//! `SQLite` connection pool setup and migration runner.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};

use crate::error::StorageError;

/// Configuration for the `SQLite` storage adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:coolhub.db` or `sqlite::memory:`).
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:coolhub.db".to_string(),
            max_connections: 4,
        }
    }
}

impl Config {
    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// and runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::initialize(&self.database_url, self.max_connections).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and run migrations.
    ///
    /// Writes use `synchronous = FULL` so an acknowledged append survives a
    /// power loss.
    async fn initialize(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
