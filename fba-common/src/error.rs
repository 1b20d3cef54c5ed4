//! Common error types for FBA services

use thiserror::Error;

use crate::retry::RetryExhausted;

/// Common result type for FBA operations
pub type Result<T> = std::result::Result<T, Error>;

/// SQLite primary result code for SQLITE_BUSY
const SQLITE_BUSY: i32 = 5;
/// SQLite primary result code for SQLITE_LOCKED
const SQLITE_LOCKED: i32 = 6;

/// Common error types across FBA services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage stayed busy through every retry attempt
    #[error("Storage busy: {0}")]
    StorageBusy(#[from] RetryExhausted),

    /// A transaction did not finish before its deadline
    #[error("Timed out after {timeout_ms} ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Closed classification of failures, used to decide whether an operation
/// may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient write contention on the single-writer store
    Busy,
    /// Deadline expired; the caller may try again later
    TimedOut,
    /// Anything else
    Fatal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Database(err) => classify_sqlx(err),
            Error::StorageBusy(_) => ErrorKind::Busy,
            Error::Timeout { .. } => ErrorKind::TimedOut,
            _ => ErrorKind::Fatal,
        }
    }
}

/// Classify a sqlx error by SQLite result code.
///
/// sqlx reports the extended result code; the low byte is the primary code,
/// so SQLITE_BUSY_SNAPSHOT (517) and friends fold into BUSY.
pub fn classify_sqlx(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::PoolTimedOut => ErrorKind::Busy,
        sqlx::Error::Database(db_err) => {
            let primary = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            match primary {
                Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => ErrorKind::Busy,
                _ => ErrorKind::Fatal,
            }
        }
        _ => ErrorKind::Fatal,
    }
}
