//! Locally tracked timer records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, TimekeepError};

/// One locally tracked work period.
///
/// Created when the user starts a timer, updated on stop and by sync
/// completion. Only synced rows may be purged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub tenant_id: Option<String>,
    pub organization_id: Option<String>,
    pub employee_id: String,
    pub day: NaiveDate,
    /// Elapsed seconds
    pub durations: f64,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub organization_team_id: Option<String>,
    pub description: Option<String>,
    pub time_slot_id: Option<String>,
    pub timesheet_id: Option<String>,
    pub timelog_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub is_started_offline: bool,
    pub is_stopped_offline: bool,
    pub synced: bool,
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimerRecord {
    /// A running timer started at `started_at`, not yet synced.
    pub fn start(employee_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            tenant_id: None,
            organization_id: None,
            employee_id: employee_id.into(),
            day: started_at.date_naive(),
            durations: 0.0,
            project_id: None,
            task_id: None,
            organization_team_id: None,
            description: None,
            time_slot_id: None,
            timesheet_id: None,
            timelog_id: None,
            started_at,
            stopped_at: None,
            is_started_offline: false,
            is_stopped_offline: false,
            synced: false,
            version: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.employee_id.trim().is_empty() {
            return Err(TimekeepError::validation("timer employee_id is required"));
        }
        if !self.durations.is_finite() || self.durations < 0.0 {
            return Err(TimekeepError::validation(format!(
                "timer durations must be a non-negative number, got {}",
                self.durations
            )));
        }
        if let Some(stopped_at) = self.stopped_at {
            if stopped_at < self.started_at {
                return Err(TimekeepError::validation("timer stopped before it started"));
            }
        }
        Ok(())
    }
}

/// Columns a timer update may touch. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerPatch {
    pub durations: Option<f64>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub is_stopped_offline: Option<bool>,
    pub description: Option<String>,
    pub time_slot_id: Option<String>,
    pub timesheet_id: Option<String>,
    pub timelog_id: Option<String>,
    pub synced: Option<bool>,
}

impl TimerPatch {
    /// Patch applied when the remote accepted the timer.
    pub fn synced() -> Self {
        Self { synced: Some(true), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(durations) = self.durations {
            if !durations.is_finite() || durations < 0.0 {
                return Err(TimekeepError::validation("timer durations must be non-negative"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn start_fills_day_from_start_time() {
        let started = Utc.with_ymd_and_hms(2024, 3, 4, 23, 59, 0).unwrap();
        let timer = TimerRecord::start("emp-1", started);

        assert_eq!(timer.day, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert!(!timer.synced);
        assert!(timer.validate().is_ok());
    }

    #[test]
    fn negative_or_nan_durations_are_invalid() {
        let mut timer = TimerRecord::start("emp-1", Utc::now());
        timer.durations = -1.0;
        assert!(timer.validate().unwrap_err().is_validation());

        timer.durations = f64::NAN;
        assert!(timer.validate().is_err());

        assert!(TimerPatch { durations: Some(f64::INFINITY), ..Default::default() }
            .validate()
            .is_err());
    }

    #[test]
    fn stop_before_start_is_invalid() {
        let started = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let mut timer = TimerRecord::start("emp-1", started);
        timer.stopped_at = Some(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        assert!(timer.validate().is_err());
    }

    #[test]
    fn serializes_camel_case_without_local_id() {
        let timer = TimerRecord::start("emp-1", Utc::now());
        let json = serde_json::to_value(&timer).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["employeeId"], "emp-1");
        assert_eq!(json["isStartedOffline"], false);
    }

    #[test]
    fn synced_patch_is_not_empty() {
        assert!(TimerPatch::default().is_empty());
        assert!(!TimerPatch::synced().is_empty());
    }
}
