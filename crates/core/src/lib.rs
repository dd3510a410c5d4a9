//! # Timekeep Core
//!
//! Business rules of the offline store - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the record DAOs and the audit queue
//! - The audit queue service driving the ledger state machine
//!
//! ## Architecture Principles
//! - Only depends on `timekeep-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod audit;
pub mod records;

pub use audit::ports::AuditQueueDao;
pub use audit::{AuditQueueService, Claim};
pub use records::ports::{IntervalDao, KbMouseActivityDao, RecordDao, ScreenshotDao, TimerDao};
