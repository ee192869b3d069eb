//! Error types for the database layer.

use thiserror::Error;

use crate::redact::redact_dsn;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
///
/// Display messages are redacted so that a `DbError` can be logged or placed
/// directly into a tool error payload without leaking a DSN password.
#[derive(Error, Debug)]
pub enum DbError {
    /// sqlx connection/query error. `sqlx::Error`'s `Display` can echo the
    /// connection string on connect failures, so the message is redacted
    /// before being wrapped.
    #[error("database error: {0}")]
    Sqlx(String),

    /// The pool has already been closed; no further operations are possible.
    #[error("connection pool is closed")]
    Closed,

    /// A DSN could not be parsed or is missing a required component.
    #[error("invalid connection string: {0}")]
    InvalidDsn(String),

    /// A statement or connection attempt exceeded its deadline.
    #[error("database operation timed out")]
    Timeout,

    /// Resource not found (used by catalog lookups).
    #[error("not found: {0}")]
    NotFound(String),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return DbError::Timeout;
        }
        if matches!(err, sqlx::Error::PoolClosed) {
            return DbError::Closed;
        }
        DbError::Sqlx(redact_dsn(&err.to_string()))
    }
}
