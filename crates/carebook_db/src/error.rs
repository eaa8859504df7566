//! Error types for the database client

use carebook_common::BookingError;
use thiserror::Error;

/// Errors that can occur when working with the database client
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query
    #[error("Database query error: {0}")]
    QueryError(String),

    /// A stored row could not be mapped to a domain value
    #[error("Database row mapping error: {0}")]
    MappingError(String),

    /// A record was rejected before being written
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Error with database transaction
    #[error("Database transaction error: {0}")]
    TransactionError(String),
}

impl DbError {
    /// Classifies a failed write, separating unique violations from other failures.
    ///
    /// 2067 is SQLite's extended code for a unique constraint, 23505 PostgreSQL's.
    pub fn from_write(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let code = db_err.code().unwrap_or_default();
            if db_err.is_unique_violation() || code == "2067" || code == "23505" {
                return DbError::UniqueViolation(db_err.message().to_string());
            }
        }
        DbError::QueryError(err.to_string())
    }
}

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation(message) => BookingError::AlreadyConfirmed(message),
            other => BookingError::Infrastructure(other.to_string()),
        }
    }
}
