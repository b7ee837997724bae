//! Event types crossing the real-time surface.
//!
//! `ClientEvent` is what a connection sends us; `ServerEvent` is what we fan
//! out. Both serialize as `{"type": "...", ...}` tagged JSON.

use serde::{Deserialize, Serialize};

/// Minimal public profile broadcast with presence and message events.
/// Deliberately not the full identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Kind of message content. Closed set so downstream handling is exhaustive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

/// Presence status a connected user can advertise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    #[default]
    Available,
    Away,
    Busy,
    /// Mid-exchange with a counterparty.
    Trading,
}

/// The ephemeral representation of a message built for live delivery,
/// distinct from whatever the durable store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub sender: UserSummary,
    pub created_at: String,
    pub is_read: bool,
}

/// One row of the connected-users listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub status: PresenceStatus,
    pub last_seen_at: String,
}

/// Client events received over a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Heartbeat to keep the connection alive
    Ping,
    /// Bulk room join
    JoinConversations { conversation_ids: Vec<String> },
    /// Single room join
    JoinConversation { conversation_id: String },
    /// Room leave; absence is not an error
    LeaveConversation { conversation_id: String },
    /// Send a message to a conversation room
    SendMessage {
        conversation_id: String,
        content: String,
        #[serde(default)]
        kind: MessageKind,
    },
    /// Typing indicator lifecycle
    TypingStart { conversation_id: String },
    TypingStop { conversation_id: String },
    /// Acknowledge messages as read; pass-through, ids are not validated
    MarkMessagesRead {
        conversation_id: String,
        message_ids: Vec<String>,
    },
    /// Join the private per-user notification room
    SubscribeNotifications,
    /// Advertise a new presence status
    UpdateStatus { status: PresenceStatus },
}

/// Server events fanned out to connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Welcome message after successful connection
    Hello { user: UserSummary },
    /// Heartbeat response
    Pong,
    /// Scoped error for the originating connection
    Error { error: String, message: String },
    /// A user came online (to all except that user)
    UserOnline { user_id: String, user: UserSummary },
    /// A user went offline (to all except that user)
    UserOffline {
        user_id: String,
        last_seen_at: String,
    },
    /// New message (to the conversation room, sender echo included)
    NewMessage { message: MessagePayload },
    /// Typing indicators (to the room minus the actor)
    UserTyping {
        conversation_id: String,
        user_id: String,
        user: UserSummary,
    },
    UserStopTyping {
        conversation_id: String,
        user_id: String,
        user: UserSummary,
    },
    /// Read receipts (to the room minus the actor)
    MessagesRead {
        conversation_id: String,
        message_ids: Vec<String>,
        read_by: String,
    },
    /// Presence status change (to all except the actor)
    UserStatusUpdate {
        user_id: String,
        status: PresenceStatus,
    },
    /// Asynchronous alert on a user's private notification room
    NewNotification { payload: serde_json::Value },
    /// Message-send failure, reported to the sender only
    MessageError { error: String },
}

impl ServerEvent {
    /// Event type name for logging/metrics
    pub fn event_type_name(&self) -> &'static str {
        match self {
            ServerEvent::Hello { .. } => "hello",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
            ServerEvent::UserOnline { .. } => "user_online",
            ServerEvent::UserOffline { .. } => "user_offline",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStopTyping { .. } => "user_stop_typing",
            ServerEvent::MessagesRead { .. } => "messages_read",
            ServerEvent::UserStatusUpdate { .. } => "user_status_update",
            ServerEvent::NewNotification { .. } => "new_notification",
            ServerEvent::MessageError { .. } => "message_error",
        }
    }
}
