//! Core storage types
//!
//! The transaction wrapper used by every write path, plus pool health and
//! metrics snapshots.

use std::fmt::Debug;
use std::sync::Arc;

use rusqlite::{Row, ToSql, Transaction as RusqliteTransaction};

use super::error::{StorageError, StorageResult};
use super::metrics::StorageMetrics;

/// Pool-level introspection implemented by connection pools.
pub trait ConnectionPool: Send + Sync + Debug {
    /// Check pool health
    fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Get pool metrics
    fn metrics(&self) -> PoolMetrics;
}

/// Transaction wrapper
///
/// Transactions automatically roll back on drop unless committed, so an
/// early `?` return inside a unit of work never leaves partial writes.
pub struct Transaction<'conn> {
    inner: Option<RusqliteTransaction<'conn>>,
    metrics: Option<Arc<StorageMetrics>>,
}

impl<'conn> Transaction<'conn> {
    /// Create a new transaction wrapper
    pub fn new(transaction: RusqliteTransaction<'conn>) -> Self {
        Self { inner: Some(transaction), metrics: None }
    }

    /// Create a wrapper that reports its outcome to the pool metrics
    pub fn with_metrics(
        transaction: RusqliteTransaction<'conn>,
        metrics: Arc<StorageMetrics>,
    ) -> Self {
        Self { inner: Some(transaction), metrics: Some(metrics) }
    }

    fn active(&self) -> StorageResult<&RusqliteTransaction<'conn>> {
        self.inner
            .as_ref()
            .ok_or_else(|| StorageError::Query("Transaction already consumed".to_string()))
    }

    /// Commit the transaction
    pub fn commit(mut self) -> StorageResult<()> {
        let tx = self
            .inner
            .take()
            .ok_or_else(|| StorageError::Query("Transaction already consumed".to_string()))?;
        tx.commit().map_err(StorageError::from)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_commit();
        }
        Ok(())
    }

    /// Rollback the transaction
    pub fn rollback(mut self) -> StorageResult<()> {
        let tx = self
            .inner
            .take()
            .ok_or_else(|| StorageError::Query("Transaction already consumed".to_string()))?;
        let result = tx.rollback().map_err(StorageError::from);
        if let Some(metrics) = &self.metrics {
            metrics.record_rollback();
        }
        result
    }

    /// Execute a statement within the transaction
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> StorageResult<usize> {
        self.active()?.execute(sql, params).map_err(StorageError::from)
    }

    /// Run a query expected to return exactly one row
    pub fn query_row<T, F>(&self, sql: &str, params: &[&dyn ToSql], f: F) -> StorageResult<T>
    where
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.active()?.query_row(sql, params, f).map_err(StorageError::from)
    }

    /// Run a query and map every returned row
    pub fn query_map<T, F>(&self, sql: &str, params: &[&dyn ToSql], f: F) -> StorageResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        let tx = self.active()?;
        let mut stmt = tx.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }

    /// Row id of the last successful insert on this connection
    pub fn last_insert_rowid(&self) -> StorageResult<i64> {
        Ok(self.active()?.last_insert_rowid())
    }
}

impl<'conn> Drop for Transaction<'conn> {
    fn drop(&mut self) {
        if let Some(tx) = self.inner.take() {
            let _ = tx.rollback();
            if let Some(metrics) = &self.metrics {
                metrics.record_rollback();
            }
        }
    }
}

/// Health status of the storage system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub healthy: bool,

    /// Number of open connections
    pub active_connections: usize,

    /// Number of idle connections
    pub idle_connections: usize,

    /// Maximum pool size
    pub max_connections: usize,

    /// Optional error message if unhealthy
    pub message: Option<String>,
}

impl HealthStatus {
    /// Create a healthy status
    pub fn healthy(active: usize, idle: usize, max: usize) -> Self {
        Self {
            healthy: true,
            active_connections: active,
            idle_connections: idle,
            max_connections: max,
            message: None,
        }
    }

    /// Create an unhealthy status
    pub fn unhealthy(message: String) -> Self {
        Self {
            healthy: false,
            active_connections: 0,
            idle_connections: 0,
            max_connections: 0,
            message: Some(message),
        }
    }
}

/// Point-in-time copy of [`StorageMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Total connections acquired
    pub connections_acquired: u64,

    /// Total connection timeouts
    pub connections_timeout: u64,

    /// Total connection errors
    pub connections_error: u64,

    /// Average connection acquisition time (milliseconds)
    pub avg_acquisition_time_ms: u64,

    /// Transactions committed
    pub transactions_committed: u64,

    /// Transactions rolled back
    pub transactions_rolled_back: u64,
}
