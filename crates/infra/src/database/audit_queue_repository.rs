//! SQLite-backed audit queue ledger.
//!
//! `save` is a single `INSERT ... ON CONFLICT(queue_id) DO UPDATE`: a known
//! `queue_id` takes the new status and one more attempt, while `payload` and
//! `created_at` stay as first written. SYNCED rows keep their status but
//! still count the attempt. Status changes after that go through
//! `update_partial`, which checks the transition inside the same
//! transaction. Two schema triggers back both rules up: `attempts` cannot
//! decrease and SYNCED cannot be left.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Row, ToSql};
use timekeep_common::storage::{SqliteConnection, Transaction};
use timekeep_core::{AuditQueueDao, RecordDao};
use timekeep_domain::constants::MAX_PAGE_LIMIT;
use timekeep_domain::{
    AuditQueueEntry, AuditQueuePatch, AuditQueueStatus, Page, RecordFilter,
    Result as DomainResult, TimekeepError, TransactionTag,
};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use super::transaction::{
    delete_row, get_json, get_time, map_join_error, map_storage_error, query_all, query_optional,
    to_db_json, to_db_time, usize_to_i64,
};

const STALE_PROCESSING_ERROR: &str = "interrupted while processing";

pub struct SqliteAuditQueueRepository {
    db: Arc<DbManager>,
}

impl SqliteAuditQueueRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn upsert_entry(tx: &Transaction<'_>, entry: &AuditQueueEntry) -> DomainResult<i64> {
        let status = entry.status.to_string();
        let payload = to_db_json(&entry.payload);
        let created_at = to_db_time(&entry.created_at);
        let updated_at = to_db_time(&Utc::now());

        let params: [&dyn ToSql; 6] =
            [&entry.queue_id, &status, &payload, &entry.last_error, &created_at, &updated_at];

        tx.query_row(AUDIT_UPSERT_SQL, params.as_slice(), |row| row.get(0))
            .map_err(map_storage_error)
    }

    fn select_by_id(tx: &Transaction<'_>, id: i64) -> DomainResult<AuditQueueEntry> {
        let params: [&dyn ToSql; 1] = [&id];
        tx.query_row(AUDIT_SELECT_BY_ID_SQL, params.as_slice(), map_audit_row).map_err(|err| {
            match map_storage_error(err) {
                TimekeepError::NotFound(_) => {
                    TimekeepError::NotFound(format!("audit queue entry {id} not found"))
                }
                other => other,
            }
        })
    }

    fn transition(
        tx: &Transaction<'_>,
        id: i64,
        patch: &AuditQueuePatch,
    ) -> DomainResult<AuditQueueEntry> {
        let current = Self::select_by_id(tx, id)?;
        current.status.ensure_transition(patch.status)?;

        let status = patch.status.to_string();
        let updated_at = to_db_time(&Utc::now());
        let params: [&dyn ToSql; 4] = [&status, &patch.last_error, &updated_at, &id];
        tx.execute(AUDIT_UPDATE_STATUS_SQL, params.as_slice()).map_err(map_storage_error)?;

        Self::select_by_id(tx, id)
    }

    fn fetch_page(
        conn: &SqliteConnection,
        page: usize,
        limit: usize,
        status: Option<AuditQueueStatus>,
    ) -> DomainResult<Page<AuditQueueEntry>> {
        let page = page.max(1);
        let limit_param = usize_to_i64(limit);
        let offset = usize_to_i64((page - 1).saturating_mul(limit));
        let status = status.map(|status| status.to_string());

        let (total, items) = match &status {
            Some(status) => {
                let count_params: [&dyn ToSql; 1] = [status];
                let total: i64 = conn
                    .query_row(AUDIT_COUNT_BY_STATUS_SQL, count_params.as_slice(), |row| {
                        row.get(0)
                    })
                    .map_err(map_storage_error)?;
                let params: [&dyn ToSql; 3] = [status, &limit_param, &offset];
                let items =
                    query_all(conn, AUDIT_PAGE_BY_STATUS_SQL, params.as_slice(), map_audit_row)?;
                (total, items)
            }
            None => {
                let total: i64 = conn
                    .query_row(AUDIT_COUNT_SQL, &[], |row| row.get(0))
                    .map_err(map_storage_error)?;
                let params: [&dyn ToSql; 2] = [&limit_param, &offset];
                let items = query_all(conn, AUDIT_PAGE_SQL, params.as_slice(), map_audit_row)?;
                (total, items)
            }
        };

        Ok(Page { items, total: u64::try_from(total).unwrap_or_default(), page, limit })
    }
}

#[async_trait]
impl RecordDao<AuditQueueEntry, AuditQueuePatch> for SqliteAuditQueueRepository {
    async fn find_all(&self) -> DomainResult<Vec<AuditQueueEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<AuditQueueEntry>> {
            let conn = db.get_connection()?;
            query_all(&conn, AUDIT_SELECT_ALL_SQL, &[], map_audit_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_one_by_id(&self, id: i64) -> DomainResult<Option<AuditQueueEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<AuditQueueEntry>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&id];
            query_optional(&conn, AUDIT_SELECT_BY_ID_SQL, params.as_slice(), map_audit_row)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Conflict-merge upsert on `queue_id`; returns the row id either way.
    async fn save(&self, value: &AuditQueueEntry) -> DomainResult<i64> {
        value.validate()?;
        let db = Arc::clone(&self.db);
        let entry = value.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            db.with_transaction(TransactionTag::AuditQueue, |tx| Self::upsert_entry(tx, &entry))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, id: i64, patch: &AuditQueuePatch) -> DomainResult<()> {
        self.update_partial(id, patch).await.map(|_| ())
    }

    async fn delete(&self, filter: &RecordFilter) -> DomainResult<()> {
        let id = filter.require_id("audit queue")?;
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::AuditQueue, |tx| delete_row(tx, "audit_queue", id))
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl AuditQueueDao for SqliteAuditQueueRepository {
    async fn update_partial(
        &self,
        id: i64,
        patch: &AuditQueuePatch,
    ) -> DomainResult<AuditQueueEntry> {
        let db = Arc::clone(&self.db);
        let patch = patch.clone();

        task::spawn_blocking(move || -> DomainResult<AuditQueueEntry> {
            db.with_transaction(TransactionTag::AuditQueue, |tx| Self::transition(tx, id, &patch))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn page_and_filter(
        &self,
        page: usize,
        limit: usize,
        status: Option<AuditQueueStatus>,
    ) -> DomainResult<Page<AuditQueueEntry>> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(TimekeepError::validation(format!(
                "page limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
            )));
        }
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Page<AuditQueueEntry>> {
            let conn = db.get_connection()?;
            Self::fetch_page(&conn, page, limit, status)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_due(&self, limit: usize, max_attempts: i64) -> DomainResult<Vec<AuditQueueEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<AuditQueueEntry>> {
            let conn = db.get_connection()?;
            let limit = usize_to_i64(limit);
            let params: [&dyn ToSql; 2] = [&max_attempts, &limit];
            query_all(&conn, AUDIT_SELECT_DUE_SQL, params.as_slice(), map_audit_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_queue_id(&self, queue_id: &str) -> DomainResult<Option<AuditQueueEntry>> {
        let db = Arc::clone(&self.db);
        let queue_id = queue_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<AuditQueueEntry>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&queue_id];
            query_optional(&conn, AUDIT_SELECT_BY_QUEUE_ID_SQL, params.as_slice(), map_audit_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dead_letters(&self, max_attempts: i64) -> DomainResult<Vec<AuditQueueEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<AuditQueueEntry>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&max_attempts];
            query_all(&conn, AUDIT_SELECT_DEAD_LETTERS_SQL, params.as_slice(), map_audit_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn recover_stale(&self) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            db.with_transaction(TransactionTag::AuditQueue, |tx| {
                let updated_at = to_db_time(&Utc::now());
                let params: [&dyn ToSql; 2] = [&STALE_PROCESSING_ERROR, &updated_at];
                tx.execute(AUDIT_RECOVER_STALE_SQL, params.as_slice()).map_err(map_storage_error)
            })
        })
        .await
        .map_err(map_join_error)?
    }
}

macro_rules! select_audit_entries {
    ($tail:literal) => {
        concat!(
            "SELECT id, queue_id, status, attempts, payload, last_error, created_at, updated_at
            FROM audit_queue ",
            $tail
        )
    };
}

const AUDIT_UPSERT_SQL: &str = "INSERT INTO audit_queue (
        queue_id, status, attempts, payload, last_error, created_at, updated_at
    ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6)
    ON CONFLICT(queue_id) DO UPDATE SET
        status = CASE WHEN audit_queue.status = 'SYNCED' THEN audit_queue.status
                      ELSE excluded.status END,
        attempts = audit_queue.attempts + 1,
        updated_at = excluded.updated_at
    RETURNING id";

const AUDIT_UPDATE_STATUS_SQL: &str =
    "UPDATE audit_queue SET status = ?1, last_error = ?2, updated_at = ?3 WHERE id = ?4";

const AUDIT_SELECT_ALL_SQL: &str = select_audit_entries!("ORDER BY id ASC");

const AUDIT_SELECT_BY_ID_SQL: &str = select_audit_entries!("WHERE id = ?1");

const AUDIT_SELECT_BY_QUEUE_ID_SQL: &str = select_audit_entries!("WHERE queue_id = ?1");

const AUDIT_SELECT_DUE_SQL: &str = select_audit_entries!(
    "WHERE status IN ('PENDING', 'FAILED') AND attempts < ?1 ORDER BY id ASC LIMIT ?2"
);

const AUDIT_SELECT_DEAD_LETTERS_SQL: &str =
    select_audit_entries!("WHERE status <> 'SYNCED' AND attempts >= ?1 ORDER BY id ASC");

const AUDIT_PAGE_SQL: &str =
    select_audit_entries!("ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2");

const AUDIT_PAGE_BY_STATUS_SQL: &str = select_audit_entries!(
    "WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
);

const AUDIT_COUNT_SQL: &str = "SELECT COUNT(*) FROM audit_queue";

const AUDIT_COUNT_BY_STATUS_SQL: &str = "SELECT COUNT(*) FROM audit_queue WHERE status = ?1";

const AUDIT_RECOVER_STALE_SQL: &str = "UPDATE audit_queue
    SET status = 'FAILED', last_error = ?1, updated_at = ?2
    WHERE status = 'PROCESSING'";

fn map_audit_row(row: &Row<'_>) -> rusqlite::Result<AuditQueueEntry> {
    let id: i64 = row.get(0)?;
    let status_raw: String = row.get(2)?;
    let status = parse_status(id, &status_raw);

    Ok(AuditQueueEntry {
        id: Some(id),
        queue_id: row.get(1)?,
        status,
        attempts: row.get(3)?,
        payload: get_json(row, 4)?,
        last_error: row.get(5)?,
        created_at: get_time(row, 6)?,
        updated_at: get_time(row, 7)?,
    })
}

fn parse_status(id: i64, raw: &str) -> AuditQueueStatus {
    match raw.parse::<AuditQueueStatus>() {
        Ok(status) => status,
        Err(err) => {
            warn!(
                entry_id = id,
                raw_status = %raw,
                error = %err,
                "invalid audit queue status in store, treating as failed"
            );
            AuditQueueStatus::Failed
        }
    }
}
