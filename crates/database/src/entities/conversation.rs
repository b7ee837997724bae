//! Conversation entity: a thread between trade counterparties, optionally
//! tied to the listing being discussed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Archived,
    Blocked,
    Deleted,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Archived => "archived",
            ConversationStatus::Blocked => "blocked",
            ConversationStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ConversationStatus::Active),
            "archived" => Some(ConversationStatus::Archived),
            "blocked" => Some(ConversationStatus::Blocked),
            "deleted" => Some(ConversationStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: i64,
    pub public_id: String,
    pub listing_ref: Option<String>,
    pub status: ConversationStatus,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }
}
