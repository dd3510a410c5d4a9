//! Values exchanged between the sync engine and the remote collaborator

use serde::{Deserialize, Serialize};

/// Record family pushed to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Timer,
    Interval,
    KbMouseActivity,
    Screenshot,
    AuditQueue,
}

crate::impl_domain_status_conversions!(EntityKind {
    Timer => "timer",
    Interval => "interval",
    KbMouseActivity => "kb_mouse_activity",
    Screenshot => "screenshot",
    AuditQueue => "audit_queue",
});

impl EntityKind {
    /// Sync order within one pass.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Timer,
        EntityKind::Interval,
        EntityKind::KbMouseActivity,
        EntityKind::Screenshot,
        EntityKind::AuditQueue,
    ];

    /// Remote path segment receiving this kind.
    pub fn path(self) -> &'static str {
        match self {
            Self::Timer => "timers",
            Self::Interval => "intervals",
            Self::KbMouseActivity => "activities",
            Self::Screenshot => "screenshots",
            Self::AuditQueue => "audit-queue",
        }
    }
}

/// Remote acceptance of one push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAck {
    /// Server-assigned id, when the remote returns one
    #[serde(default, rename = "id")]
    pub remote_id: Option<String>,
}

impl RemoteAck {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { remote_id: Some(id.into()) }
    }
}

/// Outcome counts for one record family in a sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeReport {
    pub pushed: usize,
    pub failed: usize,
    /// Rows left for the next pass because an earlier row failed or a
    /// dependency was not synced yet
    pub deferred: usize,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub timers: TypeReport,
    pub intervals: TypeReport,
    pub activities: TypeReport,
    pub screenshots: TypeReport,
    pub audit_queue: TypeReport,
    pub dead_letters: usize,
    /// Network state observed at the end of the pass
    pub network_available: bool,
}

impl SyncReport {
    pub fn for_kind_mut(&mut self, kind: EntityKind) -> &mut TypeReport {
        match kind {
            EntityKind::Timer => &mut self.timers,
            EntityKind::Interval => &mut self.intervals,
            EntityKind::KbMouseActivity => &mut self.activities,
            EntityKind::Screenshot => &mut self.screenshots,
            EntityKind::AuditQueue => &mut self.audit_queue,
        }
    }

    pub fn total_pushed(&self) -> usize {
        self.timers.pushed
            + self.intervals.pushed
            + self.activities.pushed
            + self.screenshots.pushed
            + self.audit_queue.pushed
    }

    pub fn total_failed(&self) -> usize {
        self.timers.failed
            + self.intervals.failed
            + self.activities.failed
            + self.screenshots.failed
            + self.audit_queue.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_reads_remote_id_field() {
        let ack: RemoteAck = serde_json::from_str(r#"{"id":"abc","extra":1}"#).unwrap();
        assert_eq!(ack, RemoteAck::with_id("abc"));

        let empty: RemoteAck = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.remote_id, None);
    }

    #[test]
    fn kinds_are_ordered_timer_first() {
        assert_eq!(EntityKind::ALL[0], EntityKind::Timer);
        assert_eq!(EntityKind::ALL[4], EntityKind::AuditQueue);
        assert_eq!(EntityKind::KbMouseActivity.path(), "activities");
        assert_eq!(EntityKind::KbMouseActivity.to_string(), "kb_mouse_activity");
    }

    #[test]
    fn report_totals_sum_all_kinds() {
        let mut report = SyncReport::default();
        report.for_kind_mut(EntityKind::Timer).pushed = 2;
        report.for_kind_mut(EntityKind::Screenshot).pushed = 1;
        report.for_kind_mut(EntityKind::AuditQueue).failed = 1;
        assert_eq!(report.total_pushed(), 3);
        assert_eq!(report.total_failed(), 1);
    }
}
