//! SQLite connection pool
//!
//! r2d2 pool over `r2d2_sqlite`. Every connection gets the pragmas from
//! [`apply_connection_pragmas`] before it is handed out.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::config::SqlitePoolConfig;
use super::connection::SqliteConnection;
use super::pragmas::apply_connection_pragmas;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::metrics::StorageMetrics;
use crate::storage::types::{ConnectionPool, HealthStatus, PoolMetrics};

/// Pool of SQLite connections to one database file.
#[derive(Debug)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlitePoolConfig,
    metrics: Arc<StorageMetrics>,
}

impl SqlitePool {
    /// Open (or create) the database at `path` and build the pool.
    ///
    /// A test connection is acquired before returning so a path that cannot
    /// be opened fails here rather than on first use.
    ///
    /// # Errors
    /// Returns [`StorageError::Connection`] when the file cannot be opened or
    /// the pool cannot be built.
    #[instrument(skip(config), fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        info!("Creating SQLite connection pool");

        let metrics = Arc::new(StorageMetrics::new(config.max_size));
        let pool_config = config.clone();

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        {
            let conn = pool.get().map_err(|e| {
                warn!(error = %e, "Failed to get test connection");
                StorageError::Connection(format!("Failed to get test connection: {e}"))
            })?;
            conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))?;
            debug!("Test connection verified");
        }

        info!(max_connections = config.max_size, "SQLite pool created");

        Ok(Self { pool, config, metrics })
    }

    /// Shared pool counters
    pub fn metrics(&self) -> &Arc<StorageMetrics> {
        &self.metrics
    }

    /// Check out a connection, recording acquisition time or failure.
    #[instrument(skip(self), fields(pool_size = self.config.max_size))]
    pub fn get_sqlite_connection(&self) -> StorageResult<SqliteConnection> {
        let start = std::time::Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.metrics.record_connection_acquired(duration_ms);
                debug!(duration_ms, "Connection acquired");
                Ok(SqliteConnection::with_metrics(conn, Arc::clone(&self.metrics)))
            }
            Err(e) => {
                let err_str = e.to_string().to_lowercase();

                if err_str.contains("timed out") || err_str.contains("timeout") {
                    self.metrics.record_connection_timeout();
                    warn!(timeout = ?self.config.connection_timeout, "Connection timeout");
                    Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
                } else {
                    self.metrics.record_connection_error();
                    warn!(error = %e, "Connection error");
                    Err(StorageError::Connection(format!("Failed to get connection: {e}")))
                }
            }
        }
    }
}

impl ConnectionPool for SqlitePool {
    fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.pool.state();

        match self.pool.get() {
            Ok(_conn) => Ok(HealthStatus::healthy(
                state.connections as usize,
                state.idle_connections as usize,
                self.config.max_size as usize,
            )),
            Err(e) => Ok(HealthStatus::unhealthy(format!("Pool unhealthy: {e}"))),
        }
    }

    fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            connections_acquired: self.metrics.connections_acquired.load(Ordering::Relaxed),
            connections_timeout: self.metrics.connections_timeout.load(Ordering::Relaxed),
            connections_error: self.metrics.connections_error.load(Ordering::Relaxed),
            avg_acquisition_time_ms: self.metrics.avg_connection_time_ms(),
            transactions_committed: self.metrics.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.metrics.transactions_rolled_back.load(Ordering::Relaxed),
        }
    }
}
