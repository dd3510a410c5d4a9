//! SQLite connection pool configuration

use std::time::Duration;

use crate::storage::config::StorageConfig;

/// r2d2 pool settings derived from [`StorageConfig`].
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// Connection acquisition timeout
    pub connection_timeout: Duration,

    /// Busy timeout for SQLite lock contention
    pub busy_timeout: Duration,

    /// Enable WAL journal mode
    pub enable_wal: bool,

    /// Enable foreign key constraints
    pub enable_foreign_keys: bool,
}

impl From<&StorageConfig> for SqlitePoolConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_size: config.pool_size,
            connection_timeout: Duration::from_secs(config.connection_timeout_secs),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            enable_wal: config.enable_wal,
            enable_foreign_keys: config.enable_foreign_keys,
        }
    }
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_storage_defaults() {
        let config = SqlitePoolConfig::default();

        assert_eq!(config.max_size, 4);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.busy_timeout, Duration::from_millis(5000));
        assert!(config.enable_wal);
        assert!(config.enable_foreign_keys);
    }

    #[test]
    fn test_from_storage_config() {
        let storage_config = StorageConfig {
            path: std::env::temp_dir().join("timekeep-test.db"),
            pool_size: 2,
            connection_timeout_secs: 10,
            busy_timeout_ms: 750,
            enable_wal: false,
            enable_foreign_keys: false,
        };

        let pool_config = SqlitePoolConfig::from(&storage_config);

        assert_eq!(pool_config.max_size, 2);
        assert_eq!(pool_config.connection_timeout, Duration::from_secs(10));
        assert_eq!(pool_config.busy_timeout, Duration::from_millis(750));
        assert!(!pool_config.enable_wal);
        assert!(!pool_config.enable_foreign_keys);
    }
}
