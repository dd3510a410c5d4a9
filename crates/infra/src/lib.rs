//! # Timekeep Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - SQLite repositories for every record family and the audit queue
//! - The HTTP remote pusher and the sync service
//! - The background sync scheduler
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `timekeep-core`
//! - Depends on `timekeep-common` for pooled SQLite storage
//! - Contains all "impure" code (disk, network, clocks)

pub mod config;
pub mod database;
pub mod errors;
pub mod observability;
pub mod scheduling;
pub mod sync;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use scheduling::{SchedulerError, SyncScheduler, SyncSchedulerConfig};
pub use sync::{HttpRemotePusher, RemotePusher, SyncError, SyncService, SyncSources};
