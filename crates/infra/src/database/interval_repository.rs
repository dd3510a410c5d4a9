//! SQLite-backed interval repository.
//!
//! `synced(start, end)` is the window flip used after a batch push: every
//! unsynced interval starting inside the window is marked in a single
//! transaction, row by row, and one failing row rolls back the lot.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Row, ToSql};
use timekeep_common::storage::Transaction;
use timekeep_core::{IntervalDao, RecordDao};
use timekeep_domain::{
    IntervalPatch, IntervalRecord, RecordFilter, Result as DomainResult, TimekeepError,
    TransactionTag,
};
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use super::transaction::{
    bool_to_int, delete_row, get_bool, get_time, map_join_error, map_storage_error, query_all,
    query_optional, to_db_time, update_row, Assignments,
};

pub struct SqliteIntervalRepository {
    db: Arc<DbManager>,
}

impl SqliteIntervalRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_interval(tx: &Transaction<'_>, interval: &IntervalRecord) -> DomainResult<i64> {
        let start_at = to_db_time(&interval.start_at);
        let end_at = to_db_time(&interval.end_at);
        let synced = bool_to_int(interval.synced);
        let created_at = to_db_time(&interval.created_at);
        let updated_at = to_db_time(&interval.updated_at);

        let params: [&dyn ToSql; 8] = [
            &interval.employee_id,
            &interval.timer_id,
            &interval.remote_id,
            &start_at,
            &end_at,
            &synced,
            &created_at,
            &updated_at,
        ];

        tx.execute(INTERVAL_INSERT_SQL, params.as_slice()).map_err(map_storage_error)?;
        tx.last_insert_rowid().map_err(map_storage_error)
    }

    /// `employee_id = None` covers every employee.
    fn mark_window(
        tx: &Transaction<'_>,
        employee_id: Option<&str>,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> DomainResult<usize> {
        let start = to_db_time(start);
        let end = to_db_time(end);
        let params: [&dyn ToSql; 3] = [&start, &end, &employee_id];
        let ids: Vec<i64> = tx
            .query_map(INTERVAL_WINDOW_IDS_SQL, params.as_slice(), |row| row.get(0))
            .map_err(map_storage_error)?;

        let updated_at = to_db_time(&Utc::now());
        for id in &ids {
            let params: [&dyn ToSql; 2] = [&updated_at, id];
            let changed =
                tx.execute(INTERVAL_MARK_SYNCED_SQL, params.as_slice()).map_err(map_storage_error)?;
            if changed != 1 {
                return Err(TimekeepError::Database(format!(
                    "interval {id} changed while marking the window"
                )));
            }
        }

        Ok(ids.len())
    }
}

#[async_trait]
impl RecordDao<IntervalRecord, IntervalPatch> for SqliteIntervalRepository {
    async fn find_all(&self) -> DomainResult<Vec<IntervalRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<IntervalRecord>> {
            let conn = db.get_connection()?;
            query_all(&conn, INTERVAL_SELECT_ALL_SQL, &[], map_interval_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_one_by_id(&self, id: i64) -> DomainResult<Option<IntervalRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<IntervalRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&id];
            query_optional(&conn, INTERVAL_SELECT_BY_ID_SQL, params.as_slice(), map_interval_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, value: &IntervalRecord) -> DomainResult<i64> {
        value.validate()?;
        let db = Arc::clone(&self.db);
        let interval = value.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            db.with_transaction(TransactionTag::Interval, |tx| Self::insert_interval(tx, &interval))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, id: i64, patch: &IntervalPatch) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let patch = patch.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::Interval, |tx| {
                let mut assignments = Assignments::new();
                assignments
                    .set_some("end_at", patch.end_at.as_ref().map(to_db_time))
                    .set_some("remote_id", patch.remote_id.clone())
                    .set_some("synced", patch.synced.map(bool_to_int));
                update_row(tx, "intervals", id, assignments)
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, filter: &RecordFilter) -> DomainResult<()> {
        let id = filter.require_id("interval")?;
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::Interval, |tx| delete_row(tx, "intervals", id))
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl IntervalDao for SqliteIntervalRepository {
    async fn find_all_no_synced(&self, employee_id: &str) -> DomainResult<Vec<IntervalRecord>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<IntervalRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&employee_id];
            query_all(&conn, INTERVAL_SELECT_UNSYNCED_SQL, params.as_slice(), map_interval_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn synced(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<usize> {
        self.synced_window(None, start, end).await
    }

    async fn synced_for_employee(
        &self,
        employee_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<usize> {
        self.synced_window(Some(employee_id.to_string()), start, end).await
    }
}

impl SqliteIntervalRepository {
    async fn synced_window(
        &self,
        employee_id: Option<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<usize> {
        if start > end {
            return Err(TimekeepError::validation(format!(
                "interval window start ({start}) is after its end ({end})"
            )));
        }
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let marked = db.with_transaction(TransactionTag::Interval, |tx| {
                Self::mark_window(tx, employee_id.as_deref(), &start, &end)
            })?;
            debug!(
                marked,
                employee_id = ?employee_id,
                %start,
                %end,
                "interval window marked synced"
            );
            Ok(marked)
        })
        .await
        .map_err(map_join_error)?
    }
}

macro_rules! select_intervals {
    ($tail:literal) => {
        concat!(
            "SELECT id, employee_id, timer_id, remote_id, start_at, end_at, synced, created_at,
                updated_at
            FROM intervals ",
            $tail
        )
    };
}

const INTERVAL_INSERT_SQL: &str = "INSERT INTO intervals (
        employee_id, timer_id, remote_id, start_at, end_at, synced, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const INTERVAL_SELECT_ALL_SQL: &str = select_intervals!("ORDER BY id ASC");

const INTERVAL_SELECT_BY_ID_SQL: &str = select_intervals!("WHERE id = ?1");

const INTERVAL_SELECT_UNSYNCED_SQL: &str =
    select_intervals!("WHERE employee_id = ?1 AND synced = 0 ORDER BY id ASC");

const INTERVAL_WINDOW_IDS_SQL: &str = "SELECT id FROM intervals
    WHERE synced = 0 AND start_at BETWEEN ?1 AND ?2 AND (?3 IS NULL OR employee_id = ?3)
    ORDER BY id ASC";

const INTERVAL_MARK_SYNCED_SQL: &str =
    "UPDATE intervals SET synced = 1, updated_at = ?1 WHERE id = ?2 AND synced = 0";

fn map_interval_row(row: &Row<'_>) -> rusqlite::Result<IntervalRecord> {
    Ok(IntervalRecord {
        id: Some(row.get(0)?),
        employee_id: row.get(1)?,
        timer_id: row.get(2)?,
        remote_id: row.get(3)?,
        start_at: get_time(row, 4)?,
        end_at: get_time(row, 5)?,
        synced: get_bool(row, 6)?,
        created_at: get_time(row, 7)?,
        updated_at: get_time(row, 8)?,
    })
}
