//! Interval slices captured inside a timer's span

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, TimekeepError};

/// A fine-grained slice (screenshot/activity cadence) of tracked time.
///
/// Invariant: `start_at < end_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub employee_id: String,
    /// Local timer row this slice belongs to
    pub timer_id: Option<i64>,
    pub remote_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntervalRecord {
    pub fn new(
        employee_id: impl Into<String>,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            employee_id: employee_id.into(),
            timer_id: None,
            remote_id: None,
            start_at,
            end_at,
            synced: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_timer(mut self, timer_id: i64) -> Self {
        self.timer_id = Some(timer_id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_at >= self.end_at {
            return Err(TimekeepError::validation(format!(
                "interval start_at ({}) must be before end_at ({})",
                self.start_at, self.end_at
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalPatch {
    pub end_at: Option<DateTime<Utc>>,
    pub remote_id: Option<String>,
    pub synced: Option<bool>,
}

impl IntervalPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
