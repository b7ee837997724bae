//! Error types for the database layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("database migration error: {0}")]
    Migration(String),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("stored row could not be decoded: {0}")]
    Decode(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
