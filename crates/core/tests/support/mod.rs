//! Shared test helpers for `timekeep-core` integration tests.
//!
//! In-memory ledger mirroring the SQLite repository's merge and transition
//! rules, so service behaviour can be tested without a database.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use timekeep_core::{AuditQueueDao, RecordDao};
use timekeep_domain::{
    AuditQueueEntry, AuditQueuePatch, AuditQueueStatus, Page, RecordFilter,
    Result as DomainResult, TimekeepError, TransactionTag,
};
use tokio::sync::Mutex as TokioMutex;

#[derive(Default, Clone)]
pub struct MockAuditQueueDao {
    rows: Arc<TokioMutex<Vec<AuditQueueEntry>>>,
    fail_writes: Arc<TokioMutex<bool>>,
}

impl MockAuditQueueDao {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<AuditQueueEntry> {
        self.rows.lock().await.clone()
    }

    /// Make every subsequent write fail like a rolled back transaction.
    pub async fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().await = fail;
    }

    async fn check_writable(&self) -> DomainResult<()> {
        if *self.fail_writes.lock().await {
            return Err(TimekeepError::transaction(TransactionTag::AuditQueue, "forced failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordDao<AuditQueueEntry, AuditQueuePatch> for MockAuditQueueDao {
    async fn find_all(&self) -> DomainResult<Vec<AuditQueueEntry>> {
        Ok(self.rows().await)
    }

    async fn find_one_by_id(&self, id: i64) -> DomainResult<Option<AuditQueueEntry>> {
        Ok(self.rows.lock().await.iter().find(|e| e.id == Some(id)).cloned())
    }

    async fn save(&self, value: &AuditQueueEntry) -> DomainResult<i64> {
        self.check_writable().await?;
        let mut rows = self.rows.lock().await;

        if let Some(existing) = rows.iter_mut().find(|e| e.queue_id == value.queue_id) {
            if !existing.status.is_terminal() {
                existing.status = value.status;
            }
            existing.attempts += 1;
            existing.updated_at = Utc::now();
            return existing.id.ok_or_else(|| TimekeepError::Internal("row without id".into()));
        }

        let id = i64::try_from(rows.len()).unwrap_or(i64::MAX) + 1;
        let mut stored = value.clone();
        stored.id = Some(id);
        stored.attempts = 1;
        rows.push(stored);
        Ok(id)
    }

    async fn update(&self, id: i64, patch: &AuditQueuePatch) -> DomainResult<()> {
        self.update_partial(id, patch).await.map(|_| ())
    }

    async fn delete(&self, filter: &RecordFilter) -> DomainResult<()> {
        let id = filter.require_id("audit queue")?;
        self.check_writable().await?;
        self.rows.lock().await.retain(|e| e.id != Some(id));
        Ok(())
    }
}

#[async_trait]
impl AuditQueueDao for MockAuditQueueDao {
    async fn update_partial(
        &self,
        id: i64,
        patch: &AuditQueuePatch,
    ) -> DomainResult<AuditQueueEntry> {
        self.check_writable().await?;
        let mut rows = self.rows.lock().await;
        let entry = rows
            .iter_mut()
            .find(|e| e.id == Some(id))
            .ok_or_else(|| TimekeepError::NotFound(format!("audit queue entry {id}")))?;

        entry.status.ensure_transition(patch.status)?;
        entry.status = patch.status;
        entry.last_error = patch.last_error.clone();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn page_and_filter(
        &self,
        page: usize,
        limit: usize,
        status: Option<AuditQueueStatus>,
    ) -> DomainResult<Page<AuditQueueEntry>> {
        let page = page.max(1);
        let mut matching: Vec<_> = self
            .rows()
            .await
            .into_iter()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let items = matching.into_iter().skip((page - 1) * limit).take(limit).collect();
        Ok(Page { items, total, page, limit })
    }

    async fn find_due(&self, limit: usize, max_attempts: i64) -> DomainResult<Vec<AuditQueueEntry>> {
        Ok(self
            .rows()
            .await
            .into_iter()
            .filter(|e| e.status.is_due() && e.attempts < max_attempts)
            .take(limit)
            .collect())
    }

    async fn find_by_queue_id(&self, queue_id: &str) -> DomainResult<Option<AuditQueueEntry>> {
        Ok(self.rows.lock().await.iter().find(|e| e.queue_id == queue_id).cloned())
    }

    async fn dead_letters(&self, max_attempts: i64) -> DomainResult<Vec<AuditQueueEntry>> {
        Ok(self.rows().await.into_iter().filter(|e| e.is_dead_letter(max_attempts)).collect())
    }

    async fn recover_stale(&self) -> DomainResult<usize> {
        self.check_writable().await?;
        let mut rows = self.rows.lock().await;
        let mut recovered = 0;
        for entry in rows.iter_mut().filter(|e| e.status == AuditQueueStatus::Processing) {
            entry.status = AuditQueueStatus::Failed;
            entry.last_error = Some("interrupted while processing".to_string());
            recovered += 1;
        }
        Ok(recovered)
    }
}
