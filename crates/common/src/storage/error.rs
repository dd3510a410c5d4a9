//! Storage error types
//!
//! Defines error types for the storage layer, integrating with the common
//! error classification.

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Database pool exhausted")]
    PoolExhausted,

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: i32, found: i32 },

    #[error(transparent)]
    Common(#[from] crate::CommonError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl ErrorClassification for StorageError {
    /// Busy/locked databases, pool exhaustion and acquisition timeouts are
    /// transient.
    fn is_retryable(&self) -> bool {
        match self {
            Self::PoolExhausted | Self::Timeout(_) | Self::Connection(_) => true,
            Self::Rusqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::Common(common_err) => common_err.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Migration(_) | Self::SchemaVersionMismatch { .. } => ErrorSeverity::Critical,
            Self::PoolExhausted | Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Common(common_err) => common_err.severity(),
            Self::Connection(_)
            | Self::Query(_)
            | Self::InvalidConfig(_)
            | Self::Io(_)
            | Self::Rusqlite(_)
            | Self::R2d2(_)
            | Self::SerdeJson(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Migration(_) | Self::SchemaVersionMismatch { .. })
            || matches!(self, Self::Common(err) if err.is_critical())
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::Common(common_err) => common_err.retry_after(),
            _ => None,
        }
    }
}

impl StorageError {
    /// Add operation context to the error.
    ///
    /// The message is preserved and the operation tag becomes readable
    /// through [`StorageError::operation`].
    pub fn with_operation(self, operation: impl Into<String>) -> Self {
        Self::Common(crate::CommonError::storage_op(operation, self.to_string()))
    }

    /// Operation tag attached by [`StorageError::with_operation`].
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Common(common_err) => common_err.operation(),
            _ => None,
        }
    }
}

impl From<StorageError> for crate::CommonError {
    fn from(err: StorageError) -> Self {
        if let StorageError::Common(common_err) = err {
            return common_err;
        }

        crate::CommonError::Storage { message: err.to_string(), operation: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Connection("Failed to connect".to_string());
        assert_eq!(err.to_string(), "Database connection error: Failed to connect");

        let err = StorageError::Timeout(5);
        assert_eq!(err.to_string(), "Connection timeout after 5s");

        let err = StorageError::SchemaVersionMismatch { expected: 2, found: 1 };
        assert_eq!(err.to_string(), "Schema version mismatch: expected 2, found 1");
    }

    #[test]
    fn test_error_retryability() {
        assert!(StorageError::PoolExhausted.is_retryable());
        assert!(StorageError::Timeout(5).is_retryable());
        assert!(!StorageError::InvalidConfig("test".to_string()).is_retryable());
        assert!(!StorageError::Migration("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_busy_sqlite_error_is_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert!(StorageError::from(busy).is_retryable());

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(!StorageError::from(constraint).is_retryable());
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(StorageError::Timeout(5).severity(), ErrorSeverity::Warning);
        assert_eq!(StorageError::Migration("x".to_string()).severity(), ErrorSeverity::Critical);
        assert_eq!(StorageError::Query("x".to_string()).severity(), ErrorSeverity::Error);
        assert!(StorageError::SchemaVersionMismatch { expected: 2, found: 1 }.is_critical());
    }

    #[test]
    fn test_with_operation() {
        let err = StorageError::Query("UPDATE failed".to_string()).with_operation("INTERVAL_TRX");

        assert_eq!(err.operation(), Some("INTERVAL_TRX"));
        assert!(err.to_string().contains("UPDATE failed"));
        assert_eq!(StorageError::PoolExhausted.operation(), None);
    }
}
