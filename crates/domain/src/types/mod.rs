//! Domain types and models
//!
//! One module per persisted record family, plus the shared filter/page
//! types and the values exchanged with the sync engine.

pub mod activity;
pub mod audit_queue;
pub mod filter;
pub mod interval;
pub mod screenshot;
pub mod sync;
pub mod timer;

pub use activity::{KbMouseActivityPatch, KbMouseActivityRecord};
pub use audit_queue::{AuditQueueEntry, AuditQueuePatch, AuditQueueStatus};
pub use filter::{Page, RecordFilter};
pub use interval::{IntervalPatch, IntervalRecord};
pub use screenshot::{ScreenshotPatch, ScreenshotRecord};
pub use sync::{EntityKind, RemoteAck, SyncReport, TypeReport};
pub use timer::{TimerPatch, TimerRecord};
