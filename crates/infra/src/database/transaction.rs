//! Shared helpers for the SQLite repositories.
//!
//! Column codecs (timestamps, dates, JSON, booleans), the targeted update
//! and delete statements every repository runs inside
//! [`DbManager::with_transaction`](super::manager::DbManager::with_transaction),
//! and the error mappers used at the blocking-task boundary.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Row, ToSql};
use serde_json::Value;
use timekeep_common::storage::{SqliteConnection, StorageError, Transaction};
use timekeep_domain::{Result as DomainResult, TimekeepError};
use tokio::task;
use tracing::debug;

use crate::errors::InfraError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed-width UTC text, so lexicographic order matches time order.
pub(crate) fn to_db_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn to_db_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub(crate) fn to_db_json(value: &Value) -> String {
    value.to_string()
}

pub(crate) fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn get_opt_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

pub(crate) fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn get_json(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn get_bool(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    row.get::<_, i64>(idx).map(int_to_bool)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64) -> bool {
    value != 0
}

pub(crate) fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Column assignments for a targeted `UPDATE ... WHERE id = ?`.
///
/// Only columns that were `set` appear in the statement; `updated_at` is
/// appended by [`update_row`].
#[derive(Default)]
pub(crate) struct Assignments {
    columns: Vec<&'static str>,
    values: Vec<Box<dyn ToSql>>,
}

impl Assignments {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set<V: ToSql + 'static>(&mut self, column: &'static str, value: V) -> &mut Self {
        self.columns.push(column);
        self.values.push(Box::new(value));
        self
    }

    /// `set` when `value` is present
    pub(crate) fn set_some<V: ToSql + 'static>(
        &mut self,
        column: &'static str,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    fn statement(&self, table: &str) -> String {
        let sets = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| format!("{column} = ?{}", idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!("UPDATE {table} SET {sets} WHERE id = ?{}", self.columns.len() + 1)
    }
}

/// Apply `assignments` plus `updated_at` to row `id` of `table`.
///
/// Zero affected rows is `NotFound`.
pub(crate) fn update_row(
    tx: &Transaction<'_>,
    table: &str,
    id: i64,
    mut assignments: Assignments,
) -> DomainResult<()> {
    assignments.set("updated_at", to_db_time(&Utc::now()));
    let sql = assignments.statement(table);

    let mut params: Vec<&dyn ToSql> = assignments.values.iter().map(AsRef::as_ref).collect();
    params.push(&id);

    let changed = tx.execute(&sql, params.as_slice()).map_err(map_storage_error)?;
    if changed == 0 {
        return Err(TimekeepError::NotFound(format!("{table} row {id} not found")));
    }
    Ok(())
}

/// Delete row `id` of `table`. Deleting an absent row is a no-op.
pub(crate) fn delete_row(tx: &Transaction<'_>, table: &str, id: i64) -> DomainResult<()> {
    let sql = format!("DELETE FROM {table} WHERE id = ?1");
    let params: [&dyn ToSql; 1] = [&id];
    let removed = tx.execute(&sql, params.as_slice()).map_err(map_storage_error)?;
    if removed == 0 {
        debug!(table, id, "delete matched no row");
    }
    Ok(())
}

/// Run a query expected to return at most one row.
pub(crate) fn query_optional<T, F>(
    conn: &SqliteConnection,
    sql: &str,
    params: &[&dyn ToSql],
    f: F,
) -> DomainResult<Option<T>>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    match conn.query_row(sql, params, f) {
        Ok(value) => Ok(Some(value)),
        Err(StorageError::Rusqlite(rusqlite::Error::QueryReturnedNoRows)) => Ok(None),
        Err(err) => Err(map_storage_error(err)),
    }
}

/// Run a query and map every row.
pub(crate) fn query_all<T, F>(
    conn: &SqliteConnection,
    sql: &str,
    params: &[&dyn ToSql],
    f: F,
) -> DomainResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(map_storage_error)?;
    stmt.query_map(params, f).map_err(map_storage_error)
}

pub(crate) fn map_storage_error(err: StorageError) -> TimekeepError {
    TimekeepError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: task::JoinError) -> TimekeepError {
    if err.is_cancelled() {
        TimekeepError::Internal("database task cancelled".into())
    } else {
        TimekeepError::Internal(format!("database task panic: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn db_time_is_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
            + chrono::Duration::microseconds(5);

        let early_text = to_db_time(&early);
        let late_text = to_db_time(&late);
        assert_eq!(early_text, "2024-01-01T09:00:00.000000Z");
        assert_eq!(early_text.len(), late_text.len());
        assert!(early_text < late_text);
    }

    #[test]
    fn update_statement_numbers_parameters_in_order() {
        let mut assignments = Assignments::new();
        assignments.set("synced", 1_i64).set_some("remote_id", Some("r-1".to_string()));
        assignments.set_some::<String>("description", None);

        assert_eq!(
            assignments.statement("timers"),
            "UPDATE timers SET synced = ?1, remote_id = ?2 WHERE id = ?3"
        );
    }

    #[test]
    fn bool_codec() {
        assert_eq!(bool_to_int(true), 1);
        assert!(!int_to_bool(0));
        assert_eq!(usize_to_i64(usize::MAX), i64::MAX);
    }
}
