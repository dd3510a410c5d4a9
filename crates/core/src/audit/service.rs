//! Audit queue service - ledger state machine

use std::sync::Arc;

use serde_json::Value;
use timekeep_domain::{
    AuditQueueEntry, AuditQueuePatch, AuditQueueStatus, Page, Result, TimekeepError,
};
use tracing::{debug, info, warn};

use super::ports::AuditQueueDao;

/// An entry moved to PROCESSING by [`AuditQueueService::claim`].
///
/// Outcomes consume the claim, so an entry cannot be completed or failed
/// without having been claimed first.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a claimed entry must be completed or failed"]
pub struct Claim {
    entry: AuditQueueEntry,
}

impl Claim {
    pub fn entry(&self) -> &AuditQueueEntry {
        &self.entry
    }

    pub fn queue_id(&self) -> &str {
        &self.entry.queue_id
    }

    pub fn payload(&self) -> &Value {
        &self.entry.payload
    }

    fn id(&self) -> Result<i64> {
        self.entry
            .id
            .ok_or_else(|| TimekeepError::Internal("claimed entry has no row id".to_string()))
    }
}

/// Drives audit queue entries through
/// `PENDING -> PROCESSING -> SYNCED | FAILED`.
pub struct AuditQueueService {
    dao: Arc<dyn AuditQueueDao>,
    max_attempts: i64,
}

impl AuditQueueService {
    /// Create a service with an attempt ceiling for dead letters
    pub fn new(dao: Arc<dyn AuditQueueDao>, max_attempts: i64) -> Self {
        Self { dao, max_attempts }
    }

    pub fn max_attempts(&self) -> i64 {
        self.max_attempts
    }

    /// Record an operation in the ledger and return the stored row.
    ///
    /// Re-enqueueing a known `queue_id` counts as another attempt.
    pub async fn enqueue(&self, entry: &AuditQueueEntry) -> Result<AuditQueueEntry> {
        entry.validate()?;
        self.dao.save(entry).await?;

        let stored = self.dao.find_by_queue_id(&entry.queue_id).await?.ok_or_else(|| {
            TimekeepError::NotFound(format!("audit queue entry {}", entry.queue_id))
        })?;

        debug!(
            queue_id = %stored.queue_id,
            status = %stored.status,
            attempts = stored.attempts,
            "Audit queue entry recorded"
        );
        Ok(stored)
    }

    /// Enqueue `payload` as a new PENDING entry
    pub async fn enqueue_payload(&self, payload: Value) -> Result<AuditQueueEntry> {
        self.enqueue(&AuditQueueEntry::pending(payload)).await
    }

    /// Claim a due entry for dispatch (`PENDING|FAILED -> PROCESSING`).
    pub async fn claim(&self, entry: &AuditQueueEntry) -> Result<Claim> {
        let id = entry.id.ok_or_else(|| {
            TimekeepError::validation(format!("cannot claim unsaved entry {}", entry.queue_id))
        })?;
        let entry = self.dao.update_partial(id, &AuditQueuePatch::processing()).await?;
        Ok(Claim { entry })
    }

    /// Remote accepted the entry (`PROCESSING -> SYNCED`).
    pub async fn complete(&self, claim: Claim) -> Result<AuditQueueEntry> {
        let entry = self.dao.update_partial(claim.id()?, &AuditQueuePatch::synced()).await?;
        debug!(queue_id = %entry.queue_id, "Audit queue entry synced");
        Ok(entry)
    }

    /// Dispatch failed (`PROCESSING -> FAILED`). Attempts are untouched.
    pub async fn fail(&self, claim: Claim, error: &str) -> Result<AuditQueueEntry> {
        let entry = self.dao.update_partial(claim.id()?, &AuditQueuePatch::failed(error)).await?;

        if entry.is_dead_letter(self.max_attempts) {
            warn!(
                queue_id = %entry.queue_id,
                attempts = entry.attempts,
                max_attempts = self.max_attempts,
                error,
                "Audit queue entry reached the attempt ceiling"
            );
        } else {
            debug!(queue_id = %entry.queue_id, error, "Audit queue entry failed");
        }
        Ok(entry)
    }

    /// Entries the next dispatch may claim, oldest first
    pub async fn due(&self, limit: usize) -> Result<Vec<AuditQueueEntry>> {
        self.dao.find_due(limit, self.max_attempts).await
    }

    pub async fn dead_letters(&self) -> Result<Vec<AuditQueueEntry>> {
        self.dao.dead_letters(self.max_attempts).await
    }

    /// Return entries left in PROCESSING by a crash to the retry pool.
    pub async fn recover_stale(&self) -> Result<usize> {
        let recovered = self.dao.recover_stale().await?;
        if recovered > 0 {
            info!(recovered, "Recovered audit queue entries stranded in PROCESSING");
        }
        Ok(recovered)
    }

    pub async fn page(
        &self,
        page: usize,
        limit: usize,
        status: Option<AuditQueueStatus>,
    ) -> Result<Page<AuditQueueEntry>> {
        self.dao.page_and_filter(page, limit, status).await
    }
}
