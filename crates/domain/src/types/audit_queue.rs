//! Audit queue: the durable retry ledger for outbound sync operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Result, TimekeepError};

/// Audit queue entry status.
///
/// ```text
/// PENDING ──claim──▶ PROCESSING ──ok──▶ SYNCED
///                        │  ▲
///                   err  ▼  │ claim
///                        FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditQueueStatus {
    Pending,
    Processing,
    Synced,
    Failed,
}

crate::impl_domain_status_conversions!(AuditQueueStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Synced => "SYNCED",
    Failed => "FAILED",
});

impl AuditQueueStatus {
    /// Whether the status machine allows `self -> next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Failed, Self::Processing)
                | (Self::Processing, Self::Synced | Self::Failed)
        )
    }

    /// SYNCED is the only terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synced)
    }

    /// Statuses the sync service may claim.
    pub fn is_due(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Check `self -> next`, returning a validation error when illegal.
    pub fn ensure_transition(self, next: Self) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TimekeepError::validation(format!(
                "illegal audit queue transition {self} -> {next}"
            )))
        }
    }
}

/// One ledger row, keyed by the caller-supplied `queue_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQueueEntry {
    pub id: Option<i64>,
    pub queue_id: String,
    pub status: AuditQueueStatus,
    /// Number of enqueues seen for this `queue_id`; never decreases
    pub attempts: i64,
    pub payload: Value,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditQueueEntry {
    pub fn new(queue_id: impl Into<String>, status: AuditQueueStatus, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            queue_id: queue_id.into(),
            status,
            attempts: 1,
            payload,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A PENDING entry with a fresh time-ordered queue id.
    pub fn pending(payload: Value) -> Self {
        Self::new(Uuid::now_v7().to_string(), AuditQueueStatus::Pending, payload)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_id.trim().is_empty() {
            return Err(TimekeepError::validation("audit queue entry requires a queue_id"));
        }
        Ok(())
    }

    /// Unsynced entries that reached the attempt ceiling are no longer
    /// claimed, whatever status the last enqueue left them in.
    pub fn is_dead_letter(&self, max_attempts: i64) -> bool {
        self.status != AuditQueueStatus::Synced && self.attempts >= max_attempts
    }
}

/// Status-bearing columns of an audit queue row. Never carries `payload` or
/// `attempts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQueuePatch {
    pub status: AuditQueueStatus,
    pub last_error: Option<String>,
}

impl AuditQueuePatch {
    pub fn processing() -> Self {
        Self { status: AuditQueueStatus::Processing, last_error: None }
    }

    pub fn synced() -> Self {
        Self { status: AuditQueueStatus::Synced, last_error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: AuditQueueStatus::Failed, last_error: Some(error.into()) }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use AuditQueueStatus::*;

    #[test]
    fn transitions_follow_the_ledger_state_machine() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Failed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Synced));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Synced));
        assert!(!Failed.can_transition_to(Synced));
        assert!(!Processing.can_transition_to(Pending));
        for next in [Pending, Processing, Failed, Synced] {
            assert!(!Synced.can_transition_to(next));
        }
    }

    #[test]
    fn ensure_transition_reports_both_states() {
        let err = Synced.ensure_transition(Processing).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("SYNCED -> PROCESSING"));
    }

    #[test]
    fn status_strings_are_uppercase() {
        assert_eq!(Processing.to_string(), "PROCESSING");
        assert_eq!("failed".parse::<AuditQueueStatus>().unwrap(), Failed);
        assert_eq!(serde_json::to_value(Synced).unwrap(), json!("SYNCED"));
    }

    #[test]
    fn pending_entries_get_unique_queue_ids() {
        let a = AuditQueueEntry::pending(json!({"kind": "timer"}));
        let b = AuditQueueEntry::pending(json!({"kind": "timer"}));
        assert_ne!(a.queue_id, b.queue_id);
        assert_eq!(a.status, Pending);
        assert_eq!(a.attempts, 1);
    }

    #[test]
    fn dead_letter_is_any_unsynced_entry_at_the_ceiling() {
        let mut entry = AuditQueueEntry::new("q1", Failed, json!({}));
        entry.attempts = 10;
        assert!(entry.is_dead_letter(10));
        assert!(!entry.is_dead_letter(11));

        entry.status = Pending;
        assert!(entry.is_dead_letter(10));

        entry.status = Synced;
        assert!(!entry.is_dead_letter(10));
    }

    #[test]
    fn blank_queue_id_is_invalid() {
        assert!(AuditQueueEntry::new(" ", Pending, json!(null)).validate().is_err());
    }
}
