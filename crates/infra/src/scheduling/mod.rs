//! Background scheduling for sync passes
//!
//! The scheduler owns its task explicitly: a tracked join handle, a
//! cancellation token, and a timeout on every pass and on shutdown.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SyncScheduler, SyncSchedulerConfig};
