//! Aggregated keyboard/mouse activity samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, TimekeepError};

/// Keyboard and mouse counters aggregated over `[time_start, time_end]`.
///
/// `remote_id` stays `None` until the remote acknowledges the sample; an
/// activity without one is "not synced".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KbMouseActivityRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub remote_id: Option<String>,
    pub tenant_id: String,
    pub organization_id: String,
    pub employee_id: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub kb_press_count: i64,
    pub mouse_left_click_count: i64,
    pub mouse_right_click_count: i64,
    pub mouse_movements_count: i64,
    /// Seconds of the window spent away from keyboard
    pub afk_duration: i64,
    pub kb_sequence: Value,
    pub mouse_events: Value,
    pub active_windows: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KbMouseActivityRecord {
    /// An empty sample for the given window.
    pub fn new(
        tenant_id: impl Into<String>,
        organization_id: impl Into<String>,
        employee_id: impl Into<String>,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            remote_id: None,
            tenant_id: tenant_id.into(),
            organization_id: organization_id.into(),
            employee_id: employee_id.into(),
            time_start,
            time_end,
            kb_press_count: 0,
            mouse_left_click_count: 0,
            mouse_right_click_count: 0,
            mouse_movements_count: 0,
            afk_duration: 0,
            kb_sequence: Value::Array(Vec::new()),
            mouse_events: Value::Array(Vec::new()),
            active_windows: Value::Array(Vec::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Length of the sample window in seconds
    pub fn duration_secs(&self) -> i64 {
        (self.time_end - self.time_start).num_seconds()
    }

    /// Active seconds: the window length minus time spent AFK, floored at 0
    pub fn overall_secs(&self) -> i64 {
        (self.duration_secs() - self.afk_duration).max(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.is_empty() || self.organization_id.is_empty() {
            return Err(TimekeepError::validation(
                "activity requires tenant_id and organization_id",
            ));
        }
        if self.time_end < self.time_start {
            return Err(TimekeepError::validation("activity time_end precedes time_start"));
        }
        let counters = [
            self.kb_press_count,
            self.mouse_left_click_count,
            self.mouse_right_click_count,
            self.mouse_movements_count,
            self.afk_duration,
        ];
        if counters.iter().any(|c| *c < 0) {
            return Err(TimekeepError::validation("activity counters cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KbMouseActivityPatch {
    pub remote_id: Option<String>,
    pub time_end: Option<DateTime<Utc>>,
    pub kb_press_count: Option<i64>,
    pub mouse_left_click_count: Option<i64>,
    pub mouse_right_click_count: Option<i64>,
    pub mouse_movements_count: Option<i64>,
    pub afk_duration: Option<i64>,
    pub active_windows: Option<Value>,
}

impl KbMouseActivityPatch {
    /// Patch recording the server-assigned correlation id.
    pub fn acknowledged(remote_id: impl Into<String>) -> Self {
        Self { remote_id: Some(remote_id.into()), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn sample() -> KbMouseActivityRecord {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        KbMouseActivityRecord::new("t", "o", "e", start, start + Duration::minutes(10))
    }

    #[test]
    fn overall_excludes_afk_time() {
        let mut activity = sample();
        assert_eq!(activity.duration_secs(), 600);

        activity.afk_duration = 120;
        assert_eq!(activity.overall_secs(), 480);

        activity.afk_duration = 900;
        assert_eq!(activity.overall_secs(), 0);
    }

    #[test]
    fn requires_tenant_and_organization() {
        let mut activity = sample();
        assert!(activity.validate().is_ok());

        activity.tenant_id.clear();
        assert!(activity.validate().unwrap_err().is_validation());
    }

    #[test]
    fn negative_counters_are_invalid() {
        let mut activity = sample();
        activity.mouse_movements_count = -3;
        assert!(activity.validate().is_err());
    }
}
