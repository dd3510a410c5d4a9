//! Error types used throughout the workspace

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation tag attached to transaction failures.
///
/// Lets callers tell which record family failed without inspecting the
/// storage engine's native error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionTag {
    #[serde(rename = "TIMER_TRX")]
    Timer,
    #[serde(rename = "INTERVAL_TRX")]
    Interval,
    #[serde(rename = "KB_MOUSE_TRX")]
    KbMouse,
    #[serde(rename = "SCREENSHOT_TRX")]
    Screenshot,
    #[serde(rename = "AUDIT_QUEUE_TRX")]
    AuditQueue,
}

crate::impl_domain_status_conversions!(TransactionTag {
    Timer => "TIMER_TRX",
    Interval => "INTERVAL_TRX",
    KbMouse => "KB_MOUSE_TRX",
    Screenshot => "SCREENSHOT_TRX",
    AuditQueue => "AUDIT_QUEUE_TRX",
});

/// Main error type for Timekeep
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TimekeepError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected before any store access.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store-level failure inside a unit of work; the transaction was rolled
    /// back.
    #[error("Transaction {tag} failed: {message}")]
    Transaction { tag: TransactionTag, message: String },

    /// Remote push failed; local state is left unchanged for retry.
    #[error("Sync dispatch error: {0}")]
    SyncDispatch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TimekeepError {
    /// Build a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a transaction error for `tag`
    pub fn transaction(tag: TransactionTag, message: impl Into<String>) -> Self {
        Self::Transaction { tag, message: message.into() }
    }

    /// Tag of a transaction error, `None` for every other variant
    pub fn transaction_tag(&self) -> Option<TransactionTag> {
        match self {
            Self::Transaction { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    /// True for [`TimekeepError::Validation`]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for Timekeep operations
pub type Result<T> = std::result::Result<T, TimekeepError>;
