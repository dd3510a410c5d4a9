//! Storage primitives for the embedded SQLite store
//!
//! This module provides the r2d2 connection pool, the connection and
//! transaction wrappers and the storage error type shared by every
//! repository.

pub mod config;
pub mod error;
pub mod metrics;
pub mod sqlite;
pub mod types;

// Re-export commonly used types
pub use config::{StorageConfig, StorageConfigBuilder};
pub use error::{StorageError, StorageResult};
pub use metrics::StorageMetrics;
pub use sqlite::{apply_connection_pragmas, SqliteConnection, SqlitePool, SqlitePoolConfig};
pub use types::{ConnectionPool, HealthStatus, PoolMetrics, Transaction};
