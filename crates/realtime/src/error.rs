//! Error types for the real-time layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("connection is not registered")]
    UnknownConnection,

    #[error("not a participant of conversation {0}")]
    AccessDenied(String),

    #[error("conversation store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
