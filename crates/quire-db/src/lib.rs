//! # quire-db
//!
//! PostgreSQL persistence for quire.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgJobRegistry`], the durable [`JobRegistry`] implementation
//! - Embedded migrations for the `job_registry` table
//!
//! ## Example
//!
//! ```rust,ignore
//! use quire_db::{Database, JobArgs, JobRegistry, RebuildMode, RebuildRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/quire").await?;
//!     db.migrate().await?;
//!
//!     let job = db
//!         .jobs
//!         .create(JobArgs::RebuildEmbeddings(RebuildRequest::new(RebuildMode::All)))
//!         .await?;
//!     println!("Queued job: {}", job.id);
//!     Ok(())
//! }
//! ```
pub mod jobs;
pub mod pool;

// Test fixtures for integration tests
// Note: compiled outside cfg(test) so integration tests (in tests/) can use it
#[cfg(feature = "migrations")]
pub mod test_fixtures;

// Re-export core types
pub use quire_core::*;

pub use jobs::PgJobRegistry;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

/// Database context: the pool plus the repositories built on it.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Job registry.
    pub jobs: PgJobRegistry,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            jobs: PgJobRegistry::new(pool.clone()),
            pool,
        }
    }

    /// Connect with pool settings from the environment.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

/// Apply embedded migrations to `pool`.
#[cfg(feature = "migrations")]
pub async fn run_migrations(pool: &sqlx::Pool<sqlx::Postgres>) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(())
}
