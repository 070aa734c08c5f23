//! SQLite bootstrap for the catalog database.
//!
//! Opens (or creates) the catalog file, switches it to WAL journaling, and
//! applies the embedded migrations before handing out the pool. Everything
//! above this module talks to [`Database::pool`]; nothing else issues
//! PRAGMAs or touches the schema.
//!
//! # Example
//!
//! ```no_run
//! use offliner_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("catalog.db")).await?;
//! let item_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_items")
//!     .fetch_one(db.pool())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Pool size cap. SQLite serializes writers anyway, so a handful of
/// connections is plenty for the worker plus status readers.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before giving up
/// with SQLITE_BUSY.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Errors raised while opening the catalog database.
#[derive(Error, Debug)]
pub enum DbError {
    /// The database could not be opened or configured.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// A schema migration did not apply cleanly.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Handle to the catalog database.
///
/// Wraps the connection pool; cloning is cheap and every clone shares the
/// same pool. Construction is the only place schema setup happens.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the catalog at `db_path`, creating the file when absent.
    ///
    /// WAL mode keeps status reads from blocking behind the worker's
    /// transition writes, and pending migrations run before the handle is
    /// returned, so callers always see the current schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] when the file cannot be opened or
    /// configured, and [`DbError::Migration`] when a migration fails.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Opens a throwaway in-memory catalog, migrated and ready to use.
    ///
    /// Pinned to a single connection: each SQLite `:memory:` connection is
    /// its own database, so a larger pool would scatter state. WAL is
    /// pointless without a file and is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] or [`DbError::Migration`] as
    /// [`Database::new`] does.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// The shared connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
