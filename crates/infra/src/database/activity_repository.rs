//! SQLite-backed keyboard/mouse activity repository.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Row, ToSql};
use timekeep_common::storage::Transaction;
use timekeep_core::{KbMouseActivityDao, RecordDao};
use timekeep_domain::{
    KbMouseActivityPatch, KbMouseActivityRecord, RecordFilter, Result as DomainResult,
    TimekeepError, TransactionTag,
};
use tokio::task;

use super::manager::DbManager;
use super::transaction::{
    delete_row, get_json, get_time, map_join_error, map_storage_error, query_all, query_optional,
    to_db_json, to_db_time, update_row, Assignments,
};

/// Activity samples in the `kb_mouse_activity` table.
///
/// A row is unsynced until the remote assigns it a `remote_id`.
pub struct SqliteKbMouseActivityRepository {
    db: Arc<DbManager>,
}

impl SqliteKbMouseActivityRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_activity(
        tx: &Transaction<'_>,
        activity: &KbMouseActivityRecord,
    ) -> DomainResult<i64> {
        let time_start = to_db_time(&activity.time_start);
        let time_end = to_db_time(&activity.time_end);
        let kb_sequence = to_db_json(&activity.kb_sequence);
        let mouse_events = to_db_json(&activity.mouse_events);
        let active_windows = to_db_json(&activity.active_windows);
        let created_at = to_db_time(&activity.created_at);
        let updated_at = to_db_time(&activity.updated_at);

        let params: [&dyn ToSql; 16] = [
            &activity.remote_id,
            &activity.tenant_id,
            &activity.organization_id,
            &activity.employee_id,
            &time_start,
            &time_end,
            &activity.kb_press_count,
            &activity.mouse_left_click_count,
            &activity.mouse_right_click_count,
            &activity.mouse_movements_count,
            &activity.afk_duration,
            &kb_sequence,
            &mouse_events,
            &active_windows,
            &created_at,
            &updated_at,
        ];

        tx.execute(ACTIVITY_INSERT_SQL, params.as_slice()).map_err(map_storage_error)?;
        tx.last_insert_rowid().map_err(map_storage_error)
    }

    fn validate_patch(patch: &KbMouseActivityPatch) -> DomainResult<()> {
        let counters = [
            patch.kb_press_count,
            patch.mouse_left_click_count,
            patch.mouse_right_click_count,
            patch.mouse_movements_count,
            patch.afk_duration,
        ];
        if counters.iter().flatten().any(|count| *count < 0) {
            return Err(TimekeepError::validation("activity counters cannot be negative"));
        }
        Ok(())
    }

    fn patch_assignments(patch: &KbMouseActivityPatch) -> Assignments {
        let mut assignments = Assignments::new();
        assignments
            .set_some("remote_id", patch.remote_id.clone())
            .set_some("time_end", patch.time_end.as_ref().map(to_db_time))
            .set_some("kb_press_count", patch.kb_press_count)
            .set_some("mouse_left_click_count", patch.mouse_left_click_count)
            .set_some("mouse_right_click_count", patch.mouse_right_click_count)
            .set_some("mouse_movements_count", patch.mouse_movements_count)
            .set_some("afk_duration", patch.afk_duration)
            .set_some("active_windows", patch.active_windows.as_ref().map(to_db_json));
        assignments
    }
}

#[async_trait]
impl RecordDao<KbMouseActivityRecord, KbMouseActivityPatch> for SqliteKbMouseActivityRepository {
    async fn find_all(&self) -> DomainResult<Vec<KbMouseActivityRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<KbMouseActivityRecord>> {
            let conn = db.get_connection()?;
            query_all(&conn, ACTIVITY_SELECT_ALL_SQL, &[], map_activity_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_one_by_id(&self, id: i64) -> DomainResult<Option<KbMouseActivityRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<KbMouseActivityRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&id];
            query_optional(&conn, ACTIVITY_SELECT_BY_ID_SQL, params.as_slice(), map_activity_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, value: &KbMouseActivityRecord) -> DomainResult<i64> {
        value.validate()?;
        let db = Arc::clone(&self.db);
        let activity = value.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            db.with_transaction(TransactionTag::KbMouse, |tx| {
                Self::insert_activity(tx, &activity)
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, id: i64, patch: &KbMouseActivityPatch) -> DomainResult<()> {
        Self::validate_patch(patch)?;
        let db = Arc::clone(&self.db);
        let patch = patch.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::KbMouse, |tx| {
                update_row(tx, "kb_mouse_activity", id, Self::patch_assignments(&patch))
            })
        })
        .await
        .map_err(map_join_error)?
    }

    /// Screenshots of the activity are removed with it.
    async fn delete(&self, filter: &RecordFilter) -> DomainResult<()> {
        let id = filter.require_id("activity")?;
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::KbMouse, |tx| {
                delete_row(tx, "kb_mouse_activity", id)
            })
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl KbMouseActivityDao for SqliteKbMouseActivityRepository {
    async fn current(
        &self,
        remote_id: &str,
        organization_id: &str,
        tenant_id: &str,
    ) -> DomainResult<Option<KbMouseActivityRecord>> {
        let db = Arc::clone(&self.db);
        let key = (remote_id.to_string(), organization_id.to_string(), tenant_id.to_string());

        task::spawn_blocking(move || -> DomainResult<Option<KbMouseActivityRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 3] = [&key.0, &key.1, &key.2];
            query_optional(&conn, ACTIVITY_SELECT_CURRENT_SQL, params.as_slice(), map_activity_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_all_no_synced(
        &self,
        employee_id: &str,
    ) -> DomainResult<Vec<KbMouseActivityRecord>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<KbMouseActivityRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&employee_id];
            query_all(&conn, ACTIVITY_SELECT_UNSYNCED_SQL, params.as_slice(), map_activity_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn oldest(&self, employee_id: &str) -> DomainResult<Option<KbMouseActivityRecord>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<KbMouseActivityRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&employee_id];
            query_optional(&conn, ACTIVITY_SELECT_OLDEST_SQL, params.as_slice(), map_activity_row)
        })
        .await
        .map_err(map_join_error)?
    }
}

macro_rules! select_activities {
    ($tail:literal) => {
        concat!(
            "SELECT id, remote_id, tenant_id, organization_id, employee_id, time_start, time_end,
                kb_press_count, mouse_left_click_count, mouse_right_click_count,
                mouse_movements_count, afk_duration, kb_sequence, mouse_events, active_windows,
                created_at, updated_at
            FROM kb_mouse_activity ",
            $tail
        )
    };
}

const ACTIVITY_INSERT_SQL: &str = "INSERT INTO kb_mouse_activity (
        remote_id, tenant_id, organization_id, employee_id, time_start, time_end, kb_press_count,
        mouse_left_click_count, mouse_right_click_count, mouse_movements_count, afk_duration,
        kb_sequence, mouse_events, active_windows, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

const ACTIVITY_SELECT_ALL_SQL: &str = select_activities!("ORDER BY id ASC");

const ACTIVITY_SELECT_BY_ID_SQL: &str = select_activities!("WHERE id = ?1");

const ACTIVITY_SELECT_CURRENT_SQL: &str = select_activities!(
    "WHERE remote_id = ?1 AND organization_id = ?2 AND tenant_id = ?3
    ORDER BY time_start DESC, id DESC LIMIT 1"
);

const ACTIVITY_SELECT_UNSYNCED_SQL: &str =
    select_activities!("WHERE employee_id = ?1 AND remote_id IS NULL ORDER BY id ASC");

const ACTIVITY_SELECT_OLDEST_SQL: &str =
    select_activities!("WHERE employee_id = ?1 ORDER BY time_start ASC, id ASC LIMIT 1");

fn map_activity_row(row: &Row<'_>) -> rusqlite::Result<KbMouseActivityRecord> {
    Ok(KbMouseActivityRecord {
        id: Some(row.get(0)?),
        remote_id: row.get(1)?,
        tenant_id: row.get(2)?,
        organization_id: row.get(3)?,
        employee_id: row.get(4)?,
        time_start: get_time(row, 5)?,
        time_end: get_time(row, 6)?,
        kb_press_count: row.get(7)?,
        mouse_left_click_count: row.get(8)?,
        mouse_right_click_count: row.get(9)?,
        mouse_movements_count: row.get(10)?,
        afk_duration: row.get(11)?,
        kb_sequence: get_json(row, 12)?,
        mouse_events: get_json(row, 13)?,
        active_windows: get_json(row, 14)?,
        created_at: get_time(row, 15)?,
        updated_at: get_time(row, 16)?,
    })
}
