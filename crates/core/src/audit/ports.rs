//! Port interface for the audit queue ledger

use async_trait::async_trait;
use timekeep_domain::{AuditQueueEntry, AuditQueuePatch, AuditQueueStatus, Page, Result};

use crate::records::ports::RecordDao;

/// Durable retry ledger.
///
/// `save` is the conflict-merge upsert keyed on `queue_id`: a repeated key
/// overwrites `status` and increments `attempts` instead of inserting.
#[async_trait]
pub trait AuditQueueDao: RecordDao<AuditQueueEntry, AuditQueuePatch> {
    /// Status transition on row `id`.
    ///
    /// Only `status`/`last_error` change. The transition is checked against
    /// the ledger state machine inside the same transaction; an illegal one
    /// is a validation error. Returns the updated row.
    async fn update_partial(&self, id: i64, patch: &AuditQueuePatch) -> Result<AuditQueueEntry>;

    /// 1-based page ordered by `created_at` descending, optionally filtered
    /// by status
    async fn page_and_filter(
        &self,
        page: usize,
        limit: usize,
        status: Option<AuditQueueStatus>,
    ) -> Result<Page<AuditQueueEntry>>;

    /// PENDING/FAILED entries below the attempt ceiling, ascending id
    async fn find_due(&self, limit: usize, max_attempts: i64) -> Result<Vec<AuditQueueEntry>>;

    async fn find_by_queue_id(&self, queue_id: &str) -> Result<Option<AuditQueueEntry>>;

    /// FAILED entries at or above the attempt ceiling
    async fn dead_letters(&self, max_attempts: i64) -> Result<Vec<AuditQueueEntry>>;

    /// Move entries stranded in PROCESSING to FAILED; returns the count
    async fn recover_stale(&self) -> Result<usize>;
}
