//! Screenshot metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, TimekeepError};

/// A captured screenshot attached to one activity sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub employee_id: String,
    /// Local [`KbMouseActivityRecord`](crate::KbMouseActivityRecord) id
    pub activity_id: i64,
    pub timeslot_id: Option<String>,
    pub image_path: String,
    pub recorded_at: DateTime<Utc>,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScreenshotRecord {
    pub fn new(
        employee_id: impl Into<String>,
        activity_id: i64,
        image_path: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            employee_id: employee_id.into(),
            activity_id,
            timeslot_id: None,
            image_path: image_path.into(),
            recorded_at,
            synced: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_path.trim().is_empty() {
            return Err(TimekeepError::validation("screenshot image_path is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotPatch {
    pub timeslot_id: Option<String>,
    pub image_path: Option<String>,
    pub synced: Option<bool>,
}

impl ScreenshotPatch {
    pub fn synced() -> Self {
        Self { synced: Some(true), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_path_is_required() {
        let shot = ScreenshotRecord::new("e", 1, "  ", Utc::now());
        assert!(shot.validate().unwrap_err().is_validation());
        assert!(ScreenshotRecord::new("e", 1, "/tmp/a.png", Utc::now()).validate().is_ok());
    }
}
