#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use timekeep_core::{
    AuditQueueDao, AuditQueueService, IntervalDao, KbMouseActivityDao, ScreenshotDao, TimerDao,
};
use timekeep_infra::database::{
    DbManager, SqliteAuditQueueRepository, SqliteIntervalRepository,
    SqliteKbMouseActivityRepository, SqliteScreenshotRepository, SqliteTimerRepository,
};
use timekeep_infra::sync::SyncSources;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated temporary database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }

    /// Every repository over this database.
    pub fn repositories(&self) -> Repositories {
        let manager = &self.manager;
        Repositories {
            timers: Arc::new(SqliteTimerRepository::new(Arc::clone(manager))),
            intervals: Arc::new(SqliteIntervalRepository::new(Arc::clone(manager))),
            activities: Arc::new(SqliteKbMouseActivityRepository::new(Arc::clone(manager))),
            screenshots: Arc::new(SqliteScreenshotRepository::new(Arc::clone(manager))),
            audit_queue: Arc::new(SqliteAuditQueueRepository::new(Arc::clone(manager))),
        }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Repositories {
    pub timers: Arc<dyn TimerDao>,
    pub intervals: Arc<dyn IntervalDao>,
    pub activities: Arc<dyn KbMouseActivityDao>,
    pub screenshots: Arc<dyn ScreenshotDao>,
    pub audit_queue: Arc<dyn AuditQueueDao>,
}

impl Repositories {
    pub fn audit_service(&self, max_attempts: i64) -> Arc<AuditQueueService> {
        Arc::new(AuditQueueService::new(Arc::clone(&self.audit_queue), max_attempts))
    }

    pub fn sync_sources(&self, audit_queue: Arc<AuditQueueService>) -> SyncSources {
        SyncSources {
            timers: Arc::clone(&self.timers),
            intervals: Arc::clone(&self.intervals),
            activities: Arc::clone(&self.activities),
            screenshots: Arc::clone(&self.screenshots),
            audit_queue,
        }
    }
}
