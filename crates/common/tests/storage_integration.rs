//! Integration tests for the storage module
//!
//! End-to-end pool, connection and transaction workflows against a real
//! SQLite file:
//! - pooled connections share one database
//! - transactions commit, roll back explicitly and roll back on drop
//! - pool metrics count acquisitions and transaction outcomes
//! - error classification of SQLite failures

#![cfg(feature = "platform")]

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use timekeep_common::error::{ErrorClassification, ErrorSeverity};
use timekeep_common::storage::{
    ConnectionPool, SqlitePool, SqlitePoolConfig, StorageConfig, StorageError,
};

fn temp_db_path() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("storage.db");
    (temp_dir, db_path)
}

fn pool_with_table(path: &std::path::Path) -> SqlitePool {
    let pool = SqlitePool::new(path, SqlitePoolConfig::default()).unwrap();
    let conn = pool.get_sqlite_connection().unwrap();
    conn.execute_batch(
        "CREATE TABLE ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL UNIQUE,
            attempts INTEGER NOT NULL DEFAULT 1
        )",
    )
    .unwrap();
    pool
}

fn count_rows(pool: &SqlitePool) -> i64 {
    let conn = pool.get_sqlite_connection().unwrap();
    conn.query_row("SELECT COUNT(*) FROM ledger", &[], |row| row.get(0)).unwrap()
}

#[test]
fn test_pool_from_storage_config() {
    let (_dir, path) = temp_db_path();
    let config = StorageConfig::builder(path.clone()).pool_size(2).build().unwrap();

    let pool = SqlitePool::new(&path, SqlitePoolConfig::from(&config)).unwrap();
    let health = pool.health_check().unwrap();

    assert!(health.healthy);
    assert_eq!(health.max_connections, 2);
    assert!(path.exists());
}

#[test]
fn test_committed_writes_are_visible_to_other_connections() {
    let (_dir, path) = temp_db_path();
    let pool = pool_with_table(&path);

    {
        let mut conn = pool.get_sqlite_connection().unwrap();
        let tx = conn.transaction().unwrap();
        tx.execute("INSERT INTO ledger (key) VALUES (?1)", &[&"q1"]).unwrap();
        tx.execute("INSERT INTO ledger (key) VALUES (?1)", &[&"q2"]).unwrap();
        tx.commit().unwrap();
    }

    assert_eq!(count_rows(&pool), 2);
    assert_eq!(pool.metrics().transactions_committed.load(Ordering::Relaxed), 1);
}

#[test]
fn test_failed_statement_rolls_back_whole_unit() {
    let (_dir, path) = temp_db_path();
    let pool = pool_with_table(&path);

    let result: Result<(), StorageError> = (|| {
        let mut conn = pool.get_sqlite_connection()?;
        let tx = conn.transaction()?;
        tx.execute("INSERT INTO ledger (key) VALUES (?1)", &[&"q1"])?;
        // duplicate key violates UNIQUE; the `?` drops the transaction
        tx.execute("INSERT INTO ledger (key) VALUES (?1)", &[&"q1"])?;
        tx.commit()
    })();

    let err = result.unwrap_err();
    assert!(matches!(err, StorageError::Rusqlite(_)));
    assert!(!err.is_retryable());
    assert_eq!(err.severity(), ErrorSeverity::Error);

    assert_eq!(count_rows(&pool), 0);
    assert_eq!(pool.metrics().transactions_rolled_back.load(Ordering::Relaxed), 1);
}

#[test]
fn test_explicit_rollback() {
    let (_dir, path) = temp_db_path();
    let pool = pool_with_table(&path);

    let mut conn = pool.get_sqlite_connection().unwrap();
    let tx = conn.transaction().unwrap();
    tx.execute("INSERT INTO ledger (key) VALUES ('q1')", &[]).unwrap();
    tx.rollback().unwrap();
    drop(conn);

    assert_eq!(count_rows(&pool), 0);
}

#[test]
fn test_upsert_inside_transaction() {
    let (_dir, path) = temp_db_path();
    let pool = pool_with_table(&path);
    let sql = "INSERT INTO ledger (key) VALUES (?1)
               ON CONFLICT(key) DO UPDATE SET attempts = ledger.attempts + 1
               RETURNING attempts";

    let mut conn = pool.get_sqlite_connection().unwrap();
    for expected in 1..=3_i64 {
        let tx = conn.transaction().unwrap();
        let attempts: i64 = tx.query_row(sql, &[&"q1"], |row| row.get(0)).unwrap();
        tx.commit().unwrap();
        assert_eq!(attempts, expected);
    }
}

#[test]
fn test_concurrent_writers_share_the_pool() {
    let (_dir, path) = temp_db_path();
    let pool = Arc::new(pool_with_table(&path));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for n in 0..10 {
                    let mut conn = pool.get_sqlite_connection().unwrap();
                    let tx = conn.transaction().unwrap();
                    let key = format!("w{worker}-{n}");
                    tx.execute("INSERT INTO ledger (key) VALUES (?1)", &[&key]).unwrap();
                    tx.commit().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(count_rows(&pool), 40);
    assert!(pool.metrics().connections_acquired.load(Ordering::Relaxed) >= 40);
    assert_eq!(pool.metrics().transactions_committed.load(Ordering::Relaxed), 40);
}

#[test]
fn test_operation_tag_survives_conversion() {
    let err = StorageError::Query("constraint failed".to_string()).with_operation("TIMER_TRX");
    let common: timekeep_common::CommonError = err.into();
    assert_eq!(common.operation(), Some("TIMER_TRX"));
}
