//! Domain constants
//!
//! Defaults shared by configuration, the audit queue and the sync engine.

// Storage
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
pub const SCHEMA_VERSION: i32 = 1;

// Sync engine
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_ATTEMPTS: i64 = 10;
pub const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 120;

// Audit queue listing
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 500;

// Remote push
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
