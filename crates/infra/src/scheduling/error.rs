//! Scheduler error types

use thiserror::Error;
use timekeep_domain::TimekeepError;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Operation timed out
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Background task panicked or was aborted
    #[error("Scheduler task panicked: {0}")]
    TaskPanicked(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let timekeep_err = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                TimekeepError::Validation(err.to_string())
            }
            SchedulerError::Timeout { .. } | SchedulerError::TaskPanicked(_) => {
                TimekeepError::Internal(err.to_string())
            }
        };
        InfraError(timekeep_err)
    }
}

impl From<SchedulerError> for TimekeepError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_misuse_maps_to_validation() {
        let err: TimekeepError = SchedulerError::AlreadyRunning.into();
        assert!(err.is_validation());

        let err: TimekeepError = SchedulerError::Timeout { seconds: 5 }.into();
        assert!(matches!(err, TimekeepError::Internal(msg) if msg.contains("5s")));
    }
}
