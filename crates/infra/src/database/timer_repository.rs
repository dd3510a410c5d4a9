//! SQLite-backed timer repository.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Row, ToSql};
use timekeep_common::storage::Transaction;
use timekeep_core::{RecordDao, TimerDao};
use timekeep_domain::{
    RecordFilter, Result as DomainResult, TimerPatch, TimerRecord, TransactionTag,
};
use tokio::task;

use super::manager::DbManager;
use super::transaction::{
    bool_to_int, delete_row, get_bool, get_date, get_opt_time, get_time, map_join_error,
    map_storage_error, query_all, query_optional, to_db_date, to_db_time, update_row, Assignments,
};

/// Timer rows in the `timers` table.
pub struct SqliteTimerRepository {
    db: Arc<DbManager>,
}

impl SqliteTimerRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_timer(tx: &Transaction<'_>, timer: &TimerRecord) -> DomainResult<i64> {
        let day = to_db_date(&timer.day);
        let started_at = to_db_time(&timer.started_at);
        let stopped_at = timer.stopped_at.as_ref().map(to_db_time);
        let is_started_offline = bool_to_int(timer.is_started_offline);
        let is_stopped_offline = bool_to_int(timer.is_stopped_offline);
        let synced = bool_to_int(timer.synced);
        let created_at = to_db_time(&timer.created_at);
        let updated_at = to_db_time(&timer.updated_at);

        let params: [&dyn ToSql; 20] = [
            &timer.tenant_id,
            &timer.organization_id,
            &timer.employee_id,
            &day,
            &timer.durations,
            &timer.project_id,
            &timer.task_id,
            &timer.organization_team_id,
            &timer.description,
            &timer.time_slot_id,
            &timer.timesheet_id,
            &timer.timelog_id,
            &started_at,
            &stopped_at,
            &is_started_offline,
            &is_stopped_offline,
            &synced,
            &timer.version,
            &created_at,
            &updated_at,
        ];

        tx.execute(TIMER_INSERT_SQL, params.as_slice()).map_err(map_storage_error)?;
        tx.last_insert_rowid().map_err(map_storage_error)
    }

    fn patch_assignments(patch: &TimerPatch) -> Assignments {
        let mut assignments = Assignments::new();
        assignments
            .set_some("durations", patch.durations)
            .set_some("stopped_at", patch.stopped_at.as_ref().map(to_db_time))
            .set_some("is_stopped_offline", patch.is_stopped_offline.map(bool_to_int))
            .set_some("description", patch.description.clone())
            .set_some("time_slot_id", patch.time_slot_id.clone())
            .set_some("timesheet_id", patch.timesheet_id.clone())
            .set_some("timelog_id", patch.timelog_id.clone())
            .set_some("synced", patch.synced.map(bool_to_int));
        assignments
    }
}

#[async_trait]
impl RecordDao<TimerRecord, TimerPatch> for SqliteTimerRepository {
    async fn find_all(&self) -> DomainResult<Vec<TimerRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<TimerRecord>> {
            let conn = db.get_connection()?;
            query_all(&conn, TIMER_SELECT_ALL_SQL, &[], map_timer_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_one_by_id(&self, id: i64) -> DomainResult<Option<TimerRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<TimerRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&id];
            query_optional(&conn, TIMER_SELECT_BY_ID_SQL, params.as_slice(), map_timer_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, value: &TimerRecord) -> DomainResult<i64> {
        value.validate()?;
        let db = Arc::clone(&self.db);
        let timer = value.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            db.with_transaction(TransactionTag::Timer, |tx| Self::insert_timer(tx, &timer))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, id: i64, patch: &TimerPatch) -> DomainResult<()> {
        patch.validate()?;
        let db = Arc::clone(&self.db);
        let patch = patch.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::Timer, |tx| {
                update_row(tx, "timers", id, Self::patch_assignments(&patch))
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, filter: &RecordFilter) -> DomainResult<()> {
        let id = filter.require_id("timer")?;
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::Timer, |tx| delete_row(tx, "timers", id))
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl TimerDao for SqliteTimerRepository {
    async fn find_all_no_synced(&self, employee_id: &str) -> DomainResult<Vec<TimerRecord>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<TimerRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&employee_id];
            query_all(&conn, TIMER_SELECT_UNSYNCED_SQL, params.as_slice(), map_timer_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_last_one(&self, employee_id: &str) -> DomainResult<Option<TimerRecord>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<TimerRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&employee_id];
            query_optional(&conn, TIMER_SELECT_LAST_SQL, params.as_slice(), map_timer_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn purge_synced(&self, employee_id: &str) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_string();

        task::spawn_blocking(move || -> DomainResult<usize> {
            db.with_transaction(TransactionTag::Timer, |tx| {
                let params: [&dyn ToSql; 1] = [&employee_id];
                tx.execute(TIMER_PURGE_SYNCED_SQL, params.as_slice()).map_err(map_storage_error)
            })
        })
        .await
        .map_err(map_join_error)?
    }
}

macro_rules! select_timers {
    ($tail:literal) => {
        concat!(
            "SELECT id, tenant_id, organization_id, employee_id, day, durations, project_id,
                task_id, organization_team_id, description, time_slot_id, timesheet_id,
                timelog_id, started_at, stopped_at, is_started_offline, is_stopped_offline,
                synced, version, created_at, updated_at
            FROM timers ",
            $tail
        )
    };
}

const TIMER_INSERT_SQL: &str = "INSERT INTO timers (
        tenant_id, organization_id, employee_id, day, durations, project_id, task_id,
        organization_team_id, description, time_slot_id, timesheet_id, timelog_id, started_at,
        stopped_at, is_started_offline, is_stopped_offline, synced, version, created_at, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
    )";

const TIMER_SELECT_ALL_SQL: &str = select_timers!("ORDER BY id ASC");

const TIMER_SELECT_BY_ID_SQL: &str = select_timers!("WHERE id = ?1");

const TIMER_SELECT_UNSYNCED_SQL: &str =
    select_timers!("WHERE employee_id = ?1 AND synced = 0 ORDER BY id ASC");

const TIMER_SELECT_LAST_SQL: &str = select_timers!("WHERE employee_id = ?1 ORDER BY id DESC LIMIT 1");

const TIMER_PURGE_SYNCED_SQL: &str = "DELETE FROM timers WHERE employee_id = ?1 AND synced = 1";

fn map_timer_row(row: &Row<'_>) -> rusqlite::Result<TimerRecord> {
    Ok(TimerRecord {
        id: Some(row.get(0)?),
        tenant_id: row.get(1)?,
        organization_id: row.get(2)?,
        employee_id: row.get(3)?,
        day: get_date(row, 4)?,
        durations: row.get(5)?,
        project_id: row.get(6)?,
        task_id: row.get(7)?,
        organization_team_id: row.get(8)?,
        description: row.get(9)?,
        time_slot_id: row.get(10)?,
        timesheet_id: row.get(11)?,
        timelog_id: row.get(12)?,
        started_at: get_time(row, 13)?,
        stopped_at: get_opt_time(row, 14)?,
        is_started_offline: get_bool(row, 15)?,
        is_stopped_offline: get_bool(row, 16)?,
        synced: get_bool(row, 17)?,
        version: row.get(18)?,
        created_at: get_time(row, 19)?,
        updated_at: get_time(row, 20)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use timekeep_domain::TimekeepError;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn unsynced_timers_come_back_in_id_order() {
        let (repo, _manager, _temp_dir) = setup_repository().await;

        let mut ids = Vec::new();
        for minute in [0, 10, 20] {
            ids.push(repo.save(&sample_timer("emp-1", minute)).await.expect("timer saved"));
        }
        repo.save(&sample_timer("emp-2", 5)).await.expect("other employee saved");

        let unsynced = repo.find_all_no_synced("emp-1").await.expect("query succeeds");
        let found: Vec<i64> = unsynced.iter().filter_map(|timer| timer.id).collect();
        assert_eq!(found, ids);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_marks_synced_and_keeps_other_columns() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let id = repo.save(&sample_timer("emp-1", 0)).await.unwrap();

        let patch = TimerPatch { timelog_id: Some("log-9".into()), ..TimerPatch::synced() };
        repo.update(id, &patch).await.expect("update succeeds");

        let stored = repo.find_one_by_id(id).await.unwrap().expect("row exists");
        assert!(stored.synced);
        assert_eq!(stored.timelog_id.as_deref(), Some("log-9"));
        assert_eq!(stored.employee_id, "emp-1");
        assert!(repo.find_all_no_synced("emp-1").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_missing_row_is_not_found() {
        let (repo, _manager, _temp_dir) = setup_repository().await;

        let result = repo.update(404, &TimerPatch::synced()).await;
        assert!(matches!(result, Err(TimekeepError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_last_one_returns_latest_row() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        repo.save(&sample_timer("emp-1", 0)).await.unwrap();
        let last = repo.save(&sample_timer("emp-1", 30)).await.unwrap();

        let found = repo.find_last_one("emp-1").await.unwrap().expect("timer found");
        assert_eq!(found.id, Some(last));
        assert!(repo.find_last_one("nobody").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn purge_removes_only_synced_rows() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let synced = repo.save(&sample_timer("emp-1", 0)).await.unwrap();
        let pending = repo.save(&sample_timer("emp-1", 10)).await.unwrap();
        repo.update(synced, &TimerPatch::synced()).await.unwrap();

        assert_eq!(repo.purge_synced("emp-1").await.unwrap(), 1);

        let remaining: Vec<i64> =
            repo.find_all().await.unwrap().iter().filter_map(|timer| timer.id).collect();
        assert_eq!(remaining, vec![pending]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_timer_is_rejected_before_insert() {
        let (repo, _manager, _temp_dir) = setup_repository().await;
        let mut timer = sample_timer("emp-1", 0);
        timer.durations = -1.0;

        let result = repo.save(&timer).await;
        assert!(matches!(result, Err(TimekeepError::Validation(_))));
        assert!(repo.find_all().await.unwrap().is_empty());
    }

    async fn setup_repository() -> (SqliteTimerRepository, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);
        let repo = SqliteTimerRepository::new(Arc::clone(&manager));

        (repo, manager, temp_dir)
    }

    fn sample_timer(employee_id: &str, minute: u32) -> TimerRecord {
        let started_at = Utc.with_ymd_and_hms(2024, 1, 1, 9, minute, 0).unwrap();
        TimerRecord::start(employee_id, started_at)
    }
}
