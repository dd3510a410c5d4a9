//! Audit queue service behaviour against the in-memory ledger.

mod support;

use std::sync::Arc;

use serde_json::json;
use support::MockAuditQueueDao;
use timekeep_core::AuditQueueService;
use timekeep_domain::{AuditQueueEntry, AuditQueueStatus, TimekeepError};

fn service(dao: &MockAuditQueueDao, max_attempts: i64) -> AuditQueueService {
    AuditQueueService::new(Arc::new(dao.clone()), max_attempts)
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_enqueue_merges_and_counts_attempts() {
    let dao = MockAuditQueueDao::new();
    let service = service(&dao, 10);

    let first = service
        .enqueue(&AuditQueueEntry::new("q1", AuditQueueStatus::Pending, json!({"n": 1})))
        .await
        .unwrap();
    assert_eq!(first.attempts, 1);

    let second = service
        .enqueue(&AuditQueueEntry::new("q1", AuditQueueStatus::Failed, json!({"n": 1})))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, AuditQueueStatus::Failed);
    assert_eq!(second.attempts, 2);
    assert_eq!(dao.rows().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_dispatch_keeps_attempts() {
    let dao = MockAuditQueueDao::new();
    let service = service(&dao, 10);

    service
        .enqueue(&AuditQueueEntry::new("q1", AuditQueueStatus::Pending, json!({})))
        .await
        .unwrap();
    let entry = service
        .enqueue(&AuditQueueEntry::new("q1", AuditQueueStatus::Failed, json!({})))
        .await
        .unwrap();

    let claim = service.claim(&entry).await.unwrap();
    assert_eq!(claim.entry().status, AuditQueueStatus::Processing);

    let failed = service.fail(claim, "connection refused").await.unwrap();
    assert_eq!(failed.status, AuditQueueStatus::Failed);
    assert_eq!(failed.attempts, 2);
    assert_eq!(failed.last_error.as_deref(), Some("connection refused"));
}

#[tokio::test(flavor = "multi_thread")]
async fn synced_entries_cannot_be_reclaimed() {
    let dao = MockAuditQueueDao::new();
    let service = service(&dao, 10);

    let entry = service.enqueue_payload(json!({"kind": "timer"})).await.unwrap();
    let claim = service.claim(&entry).await.unwrap();
    let synced = service.complete(claim).await.unwrap();
    assert_eq!(synced.status, AuditQueueStatus::Synced);

    let err = service.claim(&synced).await.unwrap_err();
    assert!(err.is_validation());
    assert!(service.due(10).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn claiming_an_unsaved_entry_is_rejected() {
    let dao = MockAuditQueueDao::new();
    let service = service(&dao, 10);

    let err = service.claim(&AuditQueueEntry::pending(json!({}))).await.unwrap_err();
    assert!(matches!(err, TimekeepError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn entries_at_the_ceiling_become_dead_letters() {
    let dao = MockAuditQueueDao::new();
    let service = service(&dao, 2);

    service
        .enqueue(&AuditQueueEntry::new("q1", AuditQueueStatus::Pending, json!({})))
        .await
        .unwrap();
    let entry = service
        .enqueue(&AuditQueueEntry::new("q1", AuditQueueStatus::Pending, json!({})))
        .await
        .unwrap();
    assert_eq!(entry.attempts, 2);

    // Still PENDING, yet past the ceiling: not due, reported as dead
    assert!(service.due(10).await.unwrap().is_empty());
    let dead = service.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].queue_id, "q1");
    assert_eq!(dead[0].status, AuditQueueStatus::Pending);
}

#[tokio::test(flavor = "multi_thread")]
async fn recover_stale_returns_processing_entries_to_the_pool() {
    let dao = MockAuditQueueDao::new();
    let service = service(&dao, 10);

    let entry = service.enqueue_payload(json!({})).await.unwrap();
    let _claim = service.claim(&entry).await.unwrap();
    assert!(service.due(10).await.unwrap().is_empty());

    assert_eq!(service.recover_stale().await.unwrap(), 1);
    let due = service.due(10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].status, AuditQueueStatus::Failed);
}

#[tokio::test(flavor = "multi_thread")]
async fn store_failures_propagate_with_tag() {
    let dao = MockAuditQueueDao::new();
    let service = service(&dao, 10);
    dao.fail_writes(true).await;

    let err = service.enqueue_payload(json!({})).await.unwrap_err();
    assert_eq!(err.transaction_tag(), Some(timekeep_domain::TransactionTag::AuditQueue));
    assert!(dao.rows().await.is_empty());
}
