//! Sync-specific error types
//!
//! Classifies push and store failures with retry metadata.

use timekeep_domain::TimekeepError;
use thiserror::Error;

/// Categories of sync errors for retry logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncErrorCategory {
    /// Authentication errors (401, 403)
    Authentication,
    /// Rate limiting errors (429, 503)
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Local store errors - retried next pass
    Database,
    /// Configuration errors - non-retryable
    Config,
}

/// Sync operation errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Get the error category for this error
    pub fn category(&self) -> SyncErrorCategory {
        match self {
            Self::Auth(_) => SyncErrorCategory::Authentication,
            Self::RateLimit(_) => SyncErrorCategory::RateLimit,
            Self::Server(_) => SyncErrorCategory::Server,
            Self::Client(_) => SyncErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => SyncErrorCategory::Network,
            Self::Database(_) => SyncErrorCategory::Database,
            Self::Config(_) | Self::Cancelled => SyncErrorCategory::Config,
        }
    }

    /// Check if this error should be retried
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            SyncErrorCategory::Authentication
                | SyncErrorCategory::RateLimit
                | SyncErrorCategory::Server
                | SyncErrorCategory::Network
                | SyncErrorCategory::Database
        )
    }

    /// Get suggested retry delay in seconds
    pub fn retry_delay_secs(&self) -> u64 {
        match self.category() {
            SyncErrorCategory::Authentication => 5,
            SyncErrorCategory::RateLimit => 60,
            SyncErrorCategory::Server => 10,
            SyncErrorCategory::Network => 5,
            SyncErrorCategory::Database => 2,
            SyncErrorCategory::Client | SyncErrorCategory::Config => 0,
        }
    }

    /// True when the failure says the remote could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<TimekeepError> for SyncError {
    fn from(err: TimekeepError) -> Self {
        match err {
            TimekeepError::Database(message) => Self::Database(message),
            TimekeepError::Transaction { .. } => Self::Database(err.to_string()),
            TimekeepError::Config(message) => Self::Config(message),
            TimekeepError::Network(message) => Self::Network(message),
            TimekeepError::NotFound(message)
            | TimekeepError::Validation(message)
            | TimekeepError::SyncDispatch(message) => Self::Client(message),
            TimekeepError::Internal(message) => Self::Server(message),
        }
    }
}

impl From<SyncError> for TimekeepError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Database(message) => TimekeepError::Database(message),
            SyncError::Config(message) => TimekeepError::Config(message),
            SyncError::Network(message) => TimekeepError::Network(message),
            other => TimekeepError::SyncDispatch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use timekeep_domain::TransactionTag;

    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            SyncError::Auth("test".to_string()).category(),
            SyncErrorCategory::Authentication
        );
        assert_eq!(
            SyncError::RateLimit("test".to_string()).category(),
            SyncErrorCategory::RateLimit
        );
        assert_eq!(SyncError::Server("test".to_string()).category(), SyncErrorCategory::Server);
        assert_eq!(SyncError::Network("test".to_string()).category(), SyncErrorCategory::Network);
        assert_eq!(
            SyncError::Timeout(Duration::from_secs(1)).category(),
            SyncErrorCategory::Network
        );
    }

    #[test]
    fn test_should_retry() {
        assert!(SyncError::Auth("test".to_string()).should_retry());
        assert!(SyncError::RateLimit("test".to_string()).should_retry());
        assert!(SyncError::Server("test".to_string()).should_retry());
        assert!(SyncError::Network("test".to_string()).should_retry());
        assert!(!SyncError::Client("test".to_string()).should_retry());
        assert!(!SyncError::Config("test".to_string()).should_retry());
        assert!(!SyncError::Cancelled.should_retry());
    }

    #[test]
    fn test_retry_delays() {
        assert_eq!(SyncError::Auth("test".to_string()).retry_delay_secs(), 5);
        assert_eq!(SyncError::RateLimit("test".to_string()).retry_delay_secs(), 60);
        assert_eq!(SyncError::Server("test".to_string()).retry_delay_secs(), 10);
        assert_eq!(SyncError::Network("test".to_string()).retry_delay_secs(), 5);
        assert_eq!(SyncError::Client("test".to_string()).retry_delay_secs(), 0);
    }

    #[test]
    fn transaction_failures_map_to_database() {
        let err: SyncError =
            TimekeepError::transaction(TransactionTag::Interval, "constraint failed").into();
        assert!(matches!(err, SyncError::Database(ref msg) if msg.contains("INTERVAL_TRX")));
        assert!(err.should_retry());
    }

    #[test]
    fn push_failures_surface_as_dispatch_errors() {
        let err: TimekeepError = SyncError::Server("502".to_string()).into();
        assert!(matches!(err, TimekeepError::SyncDispatch(_)));

        let err: TimekeepError = SyncError::Network("refused".to_string()).into();
        assert!(matches!(err, TimekeepError::Network(_)));
    }

    #[test]
    fn connectivity_covers_network_and_timeout() {
        assert!(SyncError::Network("down".to_string()).is_connectivity());
        assert!(SyncError::Timeout(Duration::from_secs(3)).is_connectivity());
        assert!(!SyncError::Server("500".to_string()).is_connectivity());
    }
}
