//! Seam to the conversation store.
//!
//! The hub never talks to the database directly; it consults this trait to
//! decide whether a join may be honoured. The wiring layer provides a
//! SQL-backed implementation.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation lookup failed: {0}")]
    Lookup(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Is the user a participant of the conversation?
    async fn is_participant(&self, conversation_id: &str, user_id: &str)
        -> Result<bool, StoreError>;
}
