//! # Database Layer
//!
//! The durable key-value store used by the persistence adapter and the log
//! sink. [`SqliteStore`] is the production backend; [`MemoryStore`] backs tests
//! and ephemeral runs.

mod store;

pub use store::*;

#[cfg(test)]
pub(crate) use store::FailingStore;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    migrate::Migrator,
    sqlite::{SqlitePool, SqlitePoolOptions},
};

use crate::error::Result;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// =====================================
// Database Connection
// =====================================
/// SQLite connection pool.
///
/// Cloning is cheap: clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    /// Connects to `database_url`, creating the parent directory of a
    /// file-backed database when needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the pool
    /// cannot connect.
    pub async fn connect(database_url: impl AsRef<str>) -> Result<Self> {
        let url = database_url.as_ref();
        if let Some(path) = url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// In-memory database with migrations applied.
    ///
    /// A single connection keeps every query on the same `:memory:` database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self {
            pool: Arc::new(pool),
        };

        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&*self.pool).await?;
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.pool).await?;
        Ok(())
    }
}
