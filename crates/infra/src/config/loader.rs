//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file into the process environment when one exists
//! 2. Attempts to load from environment variables
//! 3. If `TIMEKEEP_DB_PATH` is missing, falls back to a config file
//! 4. Searches multiple paths for config files (JSON and TOML)
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `TIMEKEEP_DB_PATH`: Database file path (required)
//! - `TIMEKEEP_DB_POOL_SIZE`: Connection pool size
//! - `TIMEKEEP_SYNC_INTERVAL`: Seconds between sync passes
//! - `TIMEKEEP_SYNC_ENABLED`: Whether sync is enabled (true/false)
//! - `TIMEKEEP_SYNC_BATCH_SIZE`: Rows pushed per record type per pass
//! - `TIMEKEEP_SYNC_MAX_ATTEMPTS`: Audit queue attempt ceiling
//! - `TIMEKEEP_SYNC_EMPLOYEE_ID`: Employee scope for record tables
//! - `TIMEKEEP_REMOTE_BASE_URL`: Remote push endpoint
//! - `TIMEKEEP_REMOTE_API_TOKEN`: Bearer token for the remote
//! - `TIMEKEEP_LOG_LEVEL`: Default log level
//! - `TIMEKEEP_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! `timekeep.toml`, `timekeep.json`, `config.toml` and `config.json` are
//! searched in the working directory, its two parents, then next to the
//! executable and its two parents.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use timekeep_domain::{
    Config, DatabaseConfig, LoggingConfig, RemoteConfig, Result, SyncConfig, TimekeepError,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["timekeep.toml", "timekeep.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `TimekeepError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A loaded value fails validation
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read .env file"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `TIMEKEEP_DB_PATH` is required; every other value falls back to the
/// section default.
///
/// # Errors
/// Returns `TimekeepError::Config` if the database path is missing or a
/// value does not parse.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let database = DatabaseConfig {
        path: env_var("TIMEKEEP_DB_PATH")?,
        pool_size: env_parse("TIMEKEEP_DB_POOL_SIZE", defaults.database.pool_size)?,
    };

    let sync = SyncConfig {
        enabled: env_bool("TIMEKEEP_SYNC_ENABLED", defaults.sync.enabled),
        interval_seconds: env_parse("TIMEKEEP_SYNC_INTERVAL", defaults.sync.interval_seconds)?,
        batch_size: env_parse("TIMEKEEP_SYNC_BATCH_SIZE", defaults.sync.batch_size)?,
        max_attempts: env_parse("TIMEKEEP_SYNC_MAX_ATTEMPTS", defaults.sync.max_attempts)?,
        employee_id: env_opt("TIMEKEEP_SYNC_EMPLOYEE_ID"),
        ..defaults.sync
    };

    let remote = RemoteConfig {
        base_url: env_opt("TIMEKEEP_REMOTE_BASE_URL"),
        api_token: env_opt("TIMEKEEP_REMOTE_API_TOKEN"),
        ..defaults.remote
    };

    let logging = LoggingConfig {
        level: env_opt("TIMEKEEP_LOG_LEVEL").unwrap_or(defaults.logging.level),
        json: env_bool("TIMEKEEP_LOG_JSON", defaults.logging.json),
    };

    let config = Config { database, sync, remote, logging };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations. Format is detected
/// by file extension.
///
/// # Errors
/// Returns `TimekeepError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A value fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TimekeepError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            TimekeepError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TimekeepError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TimekeepError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TimekeepError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TimekeepError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend(exe_dir.ancestors().take(3).map(Path::to_path_buf));
        }
    }

    find_config_in(&roots)
}

fn find_config_in(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        TimekeepError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Optional environment variable; empty values count as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| TimekeepError::Config(format!("Invalid value for {key}: {e}"))),
        None => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
