//! Port interfaces for the record DAOs
//!
//! Every entity shares the [`RecordDao`] contract. Entity traits add the
//! reads the sync engine and the capture services need.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use timekeep_domain::{
    IntervalPatch, IntervalRecord, KbMouseActivityPatch, KbMouseActivityRecord, RecordFilter,
    Result, ScreenshotPatch, ScreenshotRecord, TimerPatch, TimerRecord,
};

/// Generic DAO contract over a record type `T` and its patch type `P`.
///
/// Writes run in their own transaction; failures come back as
/// `TimekeepError::Transaction` tagged with the entity's operation.
#[async_trait]
pub trait RecordDao<T, P>: Send + Sync
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Every row, ascending id
    async fn find_all(&self) -> Result<Vec<T>>;

    async fn find_one_by_id(&self, id: i64) -> Result<Option<T>>;

    /// Insert `value` and return the assigned row id
    async fn save(&self, value: &T) -> Result<i64>;

    /// Apply `patch` to row `id`. A missing row is `NotFound`.
    async fn update(&self, id: i64, patch: &P) -> Result<()>;

    /// Delete the row named by `filter`.
    ///
    /// A filter without an id is a validation error and touches nothing.
    async fn delete(&self, filter: &RecordFilter) -> Result<()>;
}

/// Timer records
#[async_trait]
pub trait TimerDao: RecordDao<TimerRecord, TimerPatch> {
    /// Unsynced timers for `employee_id`, oldest first
    async fn find_all_no_synced(&self, employee_id: &str) -> Result<Vec<TimerRecord>>;

    /// Most recently created timer for `employee_id`
    async fn find_last_one(&self, employee_id: &str) -> Result<Option<TimerRecord>>;

    /// Delete the synced timers of `employee_id`; returns the count removed
    async fn purge_synced(&self, employee_id: &str) -> Result<usize>;
}

/// Interval records
#[async_trait]
pub trait IntervalDao: RecordDao<IntervalRecord, IntervalPatch> {
    async fn find_all_no_synced(&self, employee_id: &str) -> Result<Vec<IntervalRecord>>;

    /// Mark every unsynced interval with `start <= start_at <= end` as
    /// synced in one transaction. All rows or none.
    async fn synced(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize>;

    /// [`synced`](Self::synced) restricted to one employee's rows.
    async fn synced_for_employee(
        &self,
        employee_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize>;
}

/// Keyboard/mouse activity records
#[async_trait]
pub trait KbMouseActivityDao: RecordDao<KbMouseActivityRecord, KbMouseActivityPatch> {
    /// Latest activity by `time_start` for the correlation triple
    async fn current(
        &self,
        remote_id: &str,
        organization_id: &str,
        tenant_id: &str,
    ) -> Result<Option<KbMouseActivityRecord>>;

    /// Activities without a remote id, oldest first
    async fn find_all_no_synced(&self, employee_id: &str) -> Result<Vec<KbMouseActivityRecord>>;

    /// Earliest activity by `time_start` for `employee_id`
    async fn oldest(&self, employee_id: &str) -> Result<Option<KbMouseActivityRecord>>;
}

/// Screenshot records
#[async_trait]
pub trait ScreenshotDao: RecordDao<ScreenshotRecord, ScreenshotPatch> {
    async fn find_all_no_synced(&self, employee_id: &str) -> Result<Vec<ScreenshotRecord>>;

    async fn find_by_activity(&self, activity_id: i64) -> Result<Vec<ScreenshotRecord>>;
}
