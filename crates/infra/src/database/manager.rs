//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::params;
use timekeep_common::storage::{
    ConnectionPool, HealthStatus, PoolMetrics, SqliteConnection, SqlitePool, SqlitePoolConfig,
    StorageConfig, Transaction,
};
use timekeep_domain::constants::SCHEMA_VERSION;
use timekeep_domain::{DatabaseConfig, Result, TransactionTag};
use tracing::{info, warn};

use super::transaction::map_storage_error;
use crate::errors::conversions::tag_transaction_error;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Process-wide store handle.
///
/// Built once at startup and shared as `Arc<DbManager>` by every repository.
pub struct DbManager {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl DbManager {
    /// Open the database at `db_path` with a pool of `pool_size` connections.
    ///
    /// Fails if the file cannot be opened; there is no degraded mode.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let storage = StorageConfig::new(path.clone()).with_pool_size(pool_size);
        storage.validate().map_err(map_storage_error)?;

        let pool = SqlitePool::new(&path, SqlitePoolConfig::from(&storage))
            .map_err(map_storage_error)?;

        info!(
            db_path = %path.display(),
            max_connections = pool.metrics().max_pool_size(),
            "sqlite pool initialised"
        );

        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Open the database described by the `[database]` config section.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.path, config.pool_size)
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get_sqlite_connection().map_err(map_storage_error)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)?;
        Ok(())
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a trivial query and report pool occupancy.
    pub fn health_check(&self) -> Result<HealthStatus> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", &[], |row| row.get::<_, i32>(0)).map_err(map_storage_error)?;
        drop(conn);
        self.pool.health_check().map_err(map_storage_error)
    }

    /// Snapshot of connection and transaction counters.
    pub fn pool_metrics(&self) -> PoolMetrics {
        ConnectionPool::metrics(self.pool.as_ref())
    }

    /// Run `f` as one unit of work.
    ///
    /// The write lock is taken when the transaction begins. `Ok` commits;
    /// any error rolls the whole unit back and is returned tagged with `tag`
    /// (validation and not-found errors keep their kind).
    pub fn with_transaction<T, F>(&self, tag: TransactionTag, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.get_connection().map_err(|err| tag_transaction_error(tag, err))?;
        let tx = conn
            .immediate_transaction()
            .map_err(|err| tag_transaction_error(tag, map_storage_error(err)))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|err| tag_transaction_error(tag, map_storage_error(err)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(operation = %tag, error = %rollback_err, "rollback failed");
                }
                warn!(operation = %tag, error = %err, "transaction rolled back");
                Err(tag_transaction_error(tag, err))
            }
        }
    }
}

fn create_schema(conn: &SqliteConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(|err| map_storage_error(err.into()))?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_storage_error)?;
    Ok(())
}
