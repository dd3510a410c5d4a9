//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use timekeep_common::storage::StorageError;
use timekeep_domain::{TimekeepError, TransactionTag};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TimekeepError);

impl From<InfraError> for TimekeepError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TimekeepError> for InfraError {
    fn from(value: TimekeepError) -> Self {
        InfraError(value)
    }
}

trait IntoTimekeepError {
    fn into_timekeep(self) -> TimekeepError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TimekeepError */
/* -------------------------------------------------------------------------- */

impl IntoTimekeepError for SqlError {
    fn into_timekeep(self) -> TimekeepError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        TimekeepError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        TimekeepError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        TimekeepError::Database(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => TimekeepError::Database(format!(
                        "foreign key constraint violation: {message}"
                    )),
                    (ErrorCode::ConstraintViolation, 275) => {
                        TimekeepError::Database(format!("check constraint violation: {message}"))
                    }
                    _ => TimekeepError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => TimekeepError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                TimekeepError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                TimekeepError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::Utf8Error(_) => {
                TimekeepError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => TimekeepError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => TimekeepError::Database("invalid SQL query".into()),
            other => TimekeepError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_timekeep())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → TimekeepError */
/* -------------------------------------------------------------------------- */

impl IntoTimekeepError for StorageError {
    fn into_timekeep(self) -> TimekeepError {
        match self {
            StorageError::Rusqlite(sql_err) => sql_err.into_timekeep(),
            StorageError::InvalidConfig(message) => TimekeepError::Config(message),
            StorageError::SerdeJson(err) => {
                TimekeepError::Internal(format!("invalid JSON column: {err}"))
            }
            other => TimekeepError::Database(other.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_timekeep())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TimekeepError */
/* -------------------------------------------------------------------------- */

impl IntoTimekeepError for HttpError {
    fn into_timekeep(self) -> TimekeepError {
        if self.is_timeout() {
            return TimekeepError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return TimekeepError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => TimekeepError::NotFound(message),
                400..=499 => TimekeepError::SyncDispatch(message),
                _ => TimekeepError::Network(message),
            };
        }

        TimekeepError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_timekeep())
    }
}

/// Wrap a store failure inside a unit of work as a tagged transaction error.
///
/// Validation and not-found errors raised inside the closure pass through
/// unchanged so callers can still tell them apart.
pub(crate) fn tag_transaction_error(tag: TransactionTag, err: TimekeepError) -> TimekeepError {
    match err {
        TimekeepError::Validation(_)
        | TimekeepError::NotFound(_)
        | TimekeepError::Transaction { .. } => err,
        other => TimekeepError::transaction(tag, other.to_string()),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
