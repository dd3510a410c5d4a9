//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CYCLE_TIMEOUT_SECS, DEFAULT_DB_POOL_SIZE, DEFAULT_LOG_LEVEL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_PUSH_TIMEOUT_SECS, DEFAULT_REMOTE_TIMEOUT_SECS, DEFAULT_SYNC_BATCH_SIZE,
    DEFAULT_SYNC_INTERVAL_SECS,
};
use crate::{Result, TimekeepError};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Maximum rows pulled per entity type in one pass
    pub batch_size: usize,
    /// Audit queue entries at or above this attempt count are dead letters
    pub max_attempts: i64,
    pub push_timeout_seconds: u64,
    pub cycle_timeout_seconds: u64,
    /// Employee scope for a pass. `None` disables entity-table sync; the
    /// audit queue is still drained.
    pub employee_id: Option<String>,
    /// Delete activity rows after a successful push instead of keeping them
    pub prune_synced_activities: bool,
}

/// Remote push endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "timekeep.db".to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            batch_size: DEFAULT_SYNC_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            push_timeout_seconds: DEFAULT_PUSH_TIMEOUT_SECS,
            cycle_timeout_seconds: DEFAULT_CYCLE_TIMEOUT_SECS,
            employee_id: None,
            prune_synced_activities: false,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { base_url: None, api_token: None, timeout_seconds: DEFAULT_REMOTE_TIMEOUT_SECS }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}

impl Config {
    /// Reject values that would stall the pool or the sync loop.
    ///
    /// # Errors
    /// Returns [`TimekeepError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(TimekeepError::Config("database.path cannot be empty".to_string()));
        }
        if self.database.pool_size == 0 {
            return Err(TimekeepError::Config("database.pool_size must be > 0".to_string()));
        }
        if self.sync.interval_seconds == 0 {
            return Err(TimekeepError::Config("sync.interval_seconds must be > 0".to_string()));
        }
        if self.sync.batch_size == 0 {
            return Err(TimekeepError::Config("sync.batch_size must be > 0".to_string()));
        }
        if self.sync.max_attempts <= 0 {
            return Err(TimekeepError::Config("sync.max_attempts must be > 0".to_string()));
        }
        if self.sync.push_timeout_seconds == 0 || self.sync.cycle_timeout_seconds == 0 {
            return Err(TimekeepError::Config("sync timeouts must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.max_attempts, 10);
        assert!(config.sync.enabled);
        assert!(!config.logging.json);
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = Config::default();
        config.sync.interval_seconds = 0;
        assert!(matches!(config.validate(), Err(TimekeepError::Config(msg)) if msg.contains("interval")));

        let mut config = Config::default();
        config.database.pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sync.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_sections_take_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "database": { "path": "/tmp/tk.db" }, "sync": { "batch_size": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/tmp/tk.db");
        assert_eq!(config.database.pool_size, DEFAULT_DB_POOL_SIZE);
        assert_eq!(config.sync.batch_size, 5);
        assert_eq!(config.sync.interval_seconds, DEFAULT_SYNC_INTERVAL_SECS);
        assert_eq!(config.remote, RemoteConfig::default());
    }

    #[test]
    fn api_token_is_never_serialized() {
        let mut config = Config::default();
        config.remote.api_token = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
