//! Error taxonomy for both data-access contexts.
//!
//! Store-native failures (`rusqlite::Error`, `r2d2::Error`) are translated
//! into [`DataError`] by [`DataError::from_store`] and never hidden.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Problems with the statement itself or with mapping its rows.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The store rejected the statement text.
    #[error("malformed statement: {0}")]
    Malformed(String),

    /// The number of supplied parameters does not match the placeholders.
    #[error("statement expects {expected} parameters, got {actual}")]
    ParameterMismatch {
        /// Placeholders in the prepared statement.
        expected: usize,
        /// Parameters supplied by the caller.
        actual: usize,
    },

    /// A returned column could not populate the requested record type.
    #[error("row mapping failed: {0}")]
    Mapping(String),

    /// An update or removal was staged for an entity without a key.
    #[error("entity for table '{table}' has no key")]
    MissingKey {
        /// Table of the offending entity.
        table: &'static str,
    },
}

/// Errors surfaced by the read and write contexts.
#[derive(Debug, Error)]
pub enum DataError {
    /// The statement or the row mapping is wrong.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The store is unreachable or busy. Callers may retry.
    #[error("store unavailable: {0}")]
    Connectivity(String),

    /// A store-enforced invariant rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// An update or delete matched no row at the expected version.
    #[error("concurrent modification of {table} row {key}")]
    ConcurrencyConflict {
        /// Table of the conflicting row.
        table: &'static str,
        /// Key of the conflicting row, rendered for diagnostics.
        key: String,
    },

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl DataError {
    /// Translates a SQLite error into the taxonomy.
    pub fn from_store(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi, message) => {
                let detail = message.unwrap_or_else(|| ffi.to_string());
                match ffi.code {
                    ErrorCode::ConstraintViolation => DataError::ConstraintViolation(detail),
                    ErrorCode::OperationInterrupted => DataError::Cancelled,
                    ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::OutOfMemory
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::FileLockingProtocolFailed => DataError::Connectivity(detail),
                    _ => QueryError::Malformed(detail).into(),
                }
            }
            rusqlite::Error::InvalidParameterCount(actual, expected) => {
                QueryError::ParameterMismatch { expected, actual }.into()
            }
            err @ (rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)) => {
                QueryError::Mapping(err.to_string()).into()
            }
            other => QueryError::Malformed(other.to_string()).into(),
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Connectivity(_))
    }
}

impl From<rusqlite::Error> for DataError {
    fn from(err: rusqlite::Error) -> Self {
        DataError::from_store(err)
    }
}

impl From<r2d2::Error> for DataError {
    fn from(err: r2d2::Error) -> Self {
        DataError::Connectivity(err.to_string())
    }
}
