//! Error types for the database layer

use thiserror::Error;

/// Errors raised while executing statements or managing connection scopes
#[derive(Error, Debug)]
pub enum DbError {
    /// Statement failure reported by the driver, returned verbatim
    #[error("database error: {0}")]
    Driver(#[from] sqlx::Error),

    /// Stale or broken connection reported while acquiring from the pool
    #[error("bad connection: {0}")]
    BadConnection(#[source] sqlx::Error),

    #[error("transaction has already been committed or rolled back")]
    TxDone,

    /// Commit refused because a statement failed inside the transaction; it was rolled back
    #[error("transaction aborted by a failed statement and rolled back")]
    TxAborted,

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Server settings the catalogue cannot run with
    #[error("database misconfigured: {0}")]
    Misconfigured(String),
}

impl DbError {
    /// True for the two context-termination conditions
    pub fn is_context_error(&self) -> bool {
        matches!(self, DbError::Canceled | DbError::DeadlineExceeded)
    }
}

/// Mismatch between the shape of a query and the shape of the value read from it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("null value encountered in column {column}")]
    NullValue { column: String },

    #[error("unable to convert column {column} from {found} to {expected}")]
    WrongType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unsupported field type {kind} for field {field}")]
    Unsupported { field: String, kind: &'static str },

    #[error("column index {index} out of range for row with {len} columns")]
    ColumnIndex { index: usize, len: usize },
}

pub type DbResult<T> = Result<T, DbError>;
