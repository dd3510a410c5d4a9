//! SQLite-backed screenshot repository.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Row, ToSql};
use timekeep_common::storage::Transaction;
use timekeep_core::{RecordDao, ScreenshotDao};
use timekeep_domain::{
    RecordFilter, Result as DomainResult, ScreenshotPatch, ScreenshotRecord, TimekeepError,
    TransactionTag,
};
use tokio::task;

use super::manager::DbManager;
use super::transaction::{
    bool_to_int, delete_row, get_bool, get_time, map_join_error, map_storage_error, query_all,
    query_optional, to_db_time, update_row, Assignments,
};

pub struct SqliteScreenshotRepository {
    db: Arc<DbManager>,
}

impl SqliteScreenshotRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_screenshot(tx: &Transaction<'_>, shot: &ScreenshotRecord) -> DomainResult<i64> {
        let recorded_at = to_db_time(&shot.recorded_at);
        let synced = bool_to_int(shot.synced);
        let created_at = to_db_time(&shot.created_at);
        let updated_at = to_db_time(&shot.updated_at);

        let params: [&dyn ToSql; 8] = [
            &shot.employee_id,
            &shot.activity_id,
            &shot.timeslot_id,
            &shot.image_path,
            &recorded_at,
            &synced,
            &created_at,
            &updated_at,
        ];

        tx.execute(SCREENSHOT_INSERT_SQL, params.as_slice()).map_err(map_storage_error)?;
        tx.last_insert_rowid().map_err(map_storage_error)
    }
}

#[async_trait]
impl RecordDao<ScreenshotRecord, ScreenshotPatch> for SqliteScreenshotRepository {
    async fn find_all(&self) -> DomainResult<Vec<ScreenshotRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<ScreenshotRecord>> {
            let conn = db.get_connection()?;
            query_all(&conn, SCREENSHOT_SELECT_ALL_SQL, &[], map_screenshot_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_one_by_id(&self, id: i64) -> DomainResult<Option<ScreenshotRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<ScreenshotRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&id];
            query_optional(&conn, SCREENSHOT_SELECT_BY_ID_SQL, params.as_slice(), map_screenshot_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, value: &ScreenshotRecord) -> DomainResult<i64> {
        value.validate()?;
        let db = Arc::clone(&self.db);
        let shot = value.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            db.with_transaction(TransactionTag::Screenshot, |tx| Self::insert_screenshot(tx, &shot))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, id: i64, patch: &ScreenshotPatch) -> DomainResult<()> {
        if patch.image_path.as_deref().is_some_and(|path| path.trim().is_empty()) {
            return Err(TimekeepError::validation("screenshot image_path is required"));
        }
        let db = Arc::clone(&self.db);
        let patch = patch.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::Screenshot, |tx| {
                let mut assignments = Assignments::new();
                assignments
                    .set_some("timeslot_id", patch.timeslot_id.clone())
                    .set_some("image_path", patch.image_path.clone())
                    .set_some("synced", patch.synced.map(bool_to_int));
                update_row(tx, "screenshots", id, assignments)
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, filter: &RecordFilter) -> DomainResult<()> {
        let id = filter.require_id("screenshot")?;
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_transaction(TransactionTag::Screenshot, |tx| delete_row(tx, "screenshots", id))
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ScreenshotDao for SqliteScreenshotRepository {
    async fn find_all_no_synced(&self, employee_id: &str) -> DomainResult<Vec<ScreenshotRecord>> {
        let db = Arc::clone(&self.db);
        let employee_id = employee_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<ScreenshotRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&employee_id];
            query_all(&conn, SCREENSHOT_SELECT_UNSYNCED_SQL, params.as_slice(), map_screenshot_row)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_activity(&self, activity_id: i64) -> DomainResult<Vec<ScreenshotRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<ScreenshotRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&activity_id];
            query_all(&conn, SCREENSHOT_SELECT_BY_ACTIVITY_SQL, params.as_slice(), map_screenshot_row)
        })
        .await
        .map_err(map_join_error)?
    }
}

macro_rules! select_screenshots {
    ($tail:literal) => {
        concat!(
            "SELECT id, employee_id, activity_id, timeslot_id, image_path, recorded_at, synced,
                created_at, updated_at
            FROM screenshots ",
            $tail
        )
    };
}

const SCREENSHOT_INSERT_SQL: &str = "INSERT INTO screenshots (
        employee_id, activity_id, timeslot_id, image_path, recorded_at, synced, created_at,
        updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const SCREENSHOT_SELECT_ALL_SQL: &str = select_screenshots!("ORDER BY id ASC");

const SCREENSHOT_SELECT_BY_ID_SQL: &str = select_screenshots!("WHERE id = ?1");

const SCREENSHOT_SELECT_UNSYNCED_SQL: &str =
    select_screenshots!("WHERE employee_id = ?1 AND synced = 0 ORDER BY id ASC");

const SCREENSHOT_SELECT_BY_ACTIVITY_SQL: &str =
    select_screenshots!("WHERE activity_id = ?1 ORDER BY id ASC");

fn map_screenshot_row(row: &Row<'_>) -> rusqlite::Result<ScreenshotRecord> {
    Ok(ScreenshotRecord {
        id: Some(row.get(0)?),
        employee_id: row.get(1)?,
        activity_id: row.get(2)?,
        timeslot_id: row.get(3)?,
        image_path: row.get(4)?,
        recorded_at: get_time(row, 5)?,
        synced: get_bool(row, 6)?,
        created_at: get_time(row, 7)?,
        updated_at: get_time(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;
    use timekeep_domain::KbMouseActivityRecord;

    use super::super::activity_repository::SqliteKbMouseActivityRepository;
    use super::*;

    struct Fixture {
        repo: SqliteScreenshotRepository,
        activities: SqliteKbMouseActivityRepository,
        _temp_dir: TempDir,
    }

    async fn setup() -> Fixture {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);

        Fixture {
            repo: SqliteScreenshotRepository::new(Arc::clone(&manager)),
            activities: SqliteKbMouseActivityRepository::new(manager),
            _temp_dir: temp_dir,
        }
    }

    async fn activity(fixture: &Fixture) -> i64 {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let record =
            KbMouseActivityRecord::new("tenant-1", "org-1", "emp-1", start, start + Duration::minutes(1));
        fixture.activities.save(&record).await.expect("activity saved")
    }

    fn shot(activity_id: i64, name: &str) -> ScreenshotRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 30).unwrap();
        ScreenshotRecord::new("emp-1", activity_id, format!("/tmp/{name}.png"), at)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_without_id_is_rejected_and_deletes_nothing() {
        let fixture = setup().await;
        let activity_id = activity(&fixture).await;
        fixture.repo.save(&shot(activity_id, "a")).await.unwrap();

        let result = fixture.repo.delete(&RecordFilter::default()).await;

        assert!(matches!(result, Err(TimekeepError::Validation(_))));
        assert_eq!(fixture.repo.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_by_id_removes_the_row() {
        let fixture = setup().await;
        let activity_id = activity(&fixture).await;
        let id = fixture.repo.save(&shot(activity_id, "a")).await.unwrap();

        fixture.repo.delete(&RecordFilter::by_id(id)).await.unwrap();
        assert!(fixture.repo.find_one_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_activity_fails_with_screenshot_tag() {
        let fixture = setup().await;

        let err = fixture.repo.save(&shot(999, "orphan")).await.expect_err("foreign key enforced");
        assert_eq!(err.transaction_tag(), Some(TransactionTag::Screenshot));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_activity_cascades_to_screenshots() {
        let fixture = setup().await;
        let activity_id = activity(&fixture).await;
        fixture.repo.save(&shot(activity_id, "a")).await.unwrap();
        fixture.repo.save(&shot(activity_id, "b")).await.unwrap();
        assert_eq!(fixture.repo.find_by_activity(activity_id).await.unwrap().len(), 2);

        fixture.activities.delete(&RecordFilter::by_id(activity_id)).await.unwrap();
        assert!(fixture.repo.find_by_activity(activity_id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn synced_patch_clears_unsynced_list() {
        let fixture = setup().await;
        let activity_id = activity(&fixture).await;
        let id = fixture.repo.save(&shot(activity_id, "a")).await.unwrap();

        fixture.repo.update(id, &ScreenshotPatch::synced()).await.unwrap();
        assert!(fixture.repo.find_all_no_synced("emp-1").await.unwrap().is_empty());
    }
}
