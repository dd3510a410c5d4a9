//! Sync infrastructure for Timekeep
//!
//! - [`RemotePusher`]: the remote collaborator, with an HTTP implementation
//! - [`SyncService`]: one pass over the unsynced local rows
//! - [`SyncError`]: push failures classified for retry

mod errors;
pub mod pusher;
pub mod sync_service;

pub use errors::{SyncError, SyncErrorCategory};
pub use pusher::{HttpRemotePusher, RemotePusher};
pub use sync_service::{SyncService, SyncSources};
