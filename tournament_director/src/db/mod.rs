//! Durable store: PostgreSQL connection pooling, migrations and repositories.
//!
//! The durable store only ever receives trailing snapshots. Hot state lives
//! in the shared cache; these rows are the recovery fallback and the source
//! for listings.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use memory::{
    MemoryPlayerRepository, MemoryTableRepository, MemoryTimerRepository,
    MemoryTournamentRepository,
};
pub use postgres::{
    PgPlayerRepository, PgTableRepository, PgTimerRepository, PgTournamentRepository,
};
pub use repository::{PlayerRepository, TableRepository, TimerRepository, TournamentRepository};
pub use timeouts::{StoreError, StoreResult};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Arguments
    ///
    /// * `config` - Database configuration
    ///
    /// # Returns
    ///
    /// * `Result<Database, sqlx::Error>` - Database instance or error
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `migrations/`
    pub async fn migrate(&self) -> StoreResult<()> {
        match tokio::time::timeout(
            timeouts::LONG_OPERATION_TIMEOUT,
            sqlx::migrate!("./migrations").run(&self.pool),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(timeouts::LONG_OPERATION_TIMEOUT)),
        }
    }

    /// Check if the database connection is healthy
    ///
    /// # Returns
    ///
    /// * `StoreResult<()>` - Ok if healthy, error otherwise
    pub async fn health_check(&self) -> StoreResult<()> {
        timeouts::with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
