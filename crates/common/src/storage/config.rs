//! Storage configuration
//!
//! Connection pool settings and the SQLite pragmas applied to every pooled
//! connection.

use std::path::PathBuf;
use std::time::Duration;

use super::error::StorageError;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Database file path
    pub path: PathBuf,

    /// Connection pool size (default: 4)
    pub pool_size: u32,

    /// Connection timeout in seconds (default: 5)
    pub connection_timeout_secs: u64,

    /// Busy timeout in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,

    /// Enable WAL mode (default: true)
    pub enable_wal: bool,

    /// Enable foreign keys (default: true)
    pub enable_foreign_keys: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/timekeep.db"),
            pool_size: 4,
            connection_timeout_secs: 5,
            busy_timeout_ms: 5000,
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the given path
    pub fn new(path: PathBuf) -> Self {
        Self { path, ..Default::default() }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidConfig`] if any value is out of range.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.pool_size == 0 {
            return Err(StorageError::InvalidConfig(
                "pool_size must be greater than 0".to_string(),
            ));
        }
        if self.pool_size > 64 {
            return Err(StorageError::InvalidConfig("pool_size too large (max: 64)".to_string()));
        }
        if self.connection_timeout_secs == 0 {
            return Err(StorageError::InvalidConfig(
                "connection_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(StorageError::InvalidConfig(
                "busy_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig("database path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Set the connection pool size
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the busy timeout
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Create a builder for more complex configurations
    pub fn builder(path: PathBuf) -> StorageConfigBuilder {
        StorageConfigBuilder::new(path)
    }
}

/// Builder for [`StorageConfig`] that validates on `build`.
#[derive(Debug)]
pub struct StorageConfigBuilder {
    config: StorageConfig,
}

impl StorageConfigBuilder {
    /// Create a new builder
    pub fn new(path: PathBuf) -> Self {
        Self { config: StorageConfig::new(path) }
    }

    /// Set pool size
    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set connection timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout_secs = timeout.as_secs();
        self
    }

    /// Disable WAL mode
    pub fn disable_wal(mut self) -> Self {
        self.config.enable_wal = false;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<StorageConfig, StorageError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.connection_timeout_secs, 5);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.enable_wal);
        assert!(config.enable_foreign_keys);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validates() {
        let path = std::env::temp_dir().join("timekeep-test.db");

        let config = StorageConfig::builder(path.clone())
            .pool_size(8)
            .connection_timeout(Duration::from_secs(2))
            .disable_wal()
            .build()
            .unwrap();
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.connection_timeout_secs, 2);
        assert!(!config.enable_wal);

        assert!(StorageConfig::builder(path.clone()).pool_size(0).build().is_err());
        assert!(StorageConfig::builder(path).pool_size(500).build().is_err());
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = StorageConfig::new(PathBuf::new());
        assert!(matches!(config.validate(), Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn test_with_busy_timeout() {
        let config = StorageConfig::default().with_busy_timeout(Duration::from_millis(250));
        assert_eq!(config.busy_timeout_ms, 250);
    }
}
