//! Database implementations

pub mod activity_repository;
pub mod audit_queue_repository;
pub mod interval_repository;
pub mod manager;
pub mod screenshot_repository;
pub mod timer_repository;
pub(crate) mod transaction;

pub use activity_repository::SqliteKbMouseActivityRepository;
pub use audit_queue_repository::SqliteAuditQueueRepository;
pub use interval_repository::SqliteIntervalRepository;
pub use manager::DbManager;
pub use screenshot_repository::SqliteScreenshotRepository;
pub use timer_repository::SqliteTimerRepository;
