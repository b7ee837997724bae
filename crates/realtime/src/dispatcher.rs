//! Inbound event dispatch.
//!
//! One call per decoded client event. Events from the same connection are
//! handled serially by the transport's read loop; events from different
//! connections interleave freely. A failing handler never tears down the
//! connection — failures are answered with scoped error events or dropped,
//! per event class.

use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::connection::ConnectionId;
use crate::error::RealtimeError;
use crate::events::{ClientEvent, MessageKind, MessagePayload, ServerEvent, UserSummary};
use crate::hub::{now_rfc3339, RealtimeHub};
use crate::rooms::user_room;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

fn new_message_id() -> String {
    CUID.create_id()
}

/// Handle one client event on behalf of a registered connection.
pub async fn dispatch(hub: &RealtimeHub, connection: ConnectionId, event: ClientEvent) {
    // The connection may have raced its own disconnect; drop the event.
    let Some(actor) = hub.connection_user(connection).await else {
        debug!(%connection, "event from unregistered connection dropped");
        return;
    };

    match event {
        ClientEvent::Ping => {
            hub.send_to_connection(connection, ServerEvent::Pong).await;
        }
        ClientEvent::JoinConversations { conversation_ids } => {
            for conversation_id in conversation_ids {
                join_conversation(hub, connection, &conversation_id).await;
            }
        }
        ClientEvent::JoinConversation { conversation_id } => {
            join_conversation(hub, connection, &conversation_id).await;
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            hub.leave_room(connection, &conversation_id).await;
        }
        ClientEvent::SendMessage {
            conversation_id,
            content,
            kind,
        } => {
            send_message(hub, connection, &actor, conversation_id, content, kind).await;
        }
        ClientEvent::TypingStart { conversation_id } => {
            let event = ServerEvent::UserTyping {
                conversation_id: conversation_id.clone(),
                user_id: actor.id.clone(),
                user: actor,
            };
            let _ = hub
                .broadcast_to_room(&conversation_id, &event, Some(connection))
                .await;
        }
        ClientEvent::TypingStop { conversation_id } => {
            let event = ServerEvent::UserStopTyping {
                conversation_id: conversation_id.clone(),
                user_id: actor.id.clone(),
                user: actor,
            };
            let _ = hub
                .broadcast_to_room(&conversation_id, &event, Some(connection))
                .await;
        }
        ClientEvent::MarkMessagesRead {
            conversation_id,
            message_ids,
        } => {
            // Pass-through notification; the durable read-state mutation is
            // the store's concern, not ours.
            let event = ServerEvent::MessagesRead {
                conversation_id: conversation_id.clone(),
                message_ids,
                read_by: actor.id.clone(),
            };
            let _ = hub
                .broadcast_to_room(&conversation_id, &event, Some(connection))
                .await;
        }
        ClientEvent::SubscribeNotifications => {
            if let Err(err) = hub.join_room(connection, &user_room(&actor.id)).await {
                debug!(%connection, %err, "notification subscription failed");
            }
        }
        ClientEvent::UpdateStatus { status } => {
            hub.set_status(connection, status).await;
        }
    }
}

/// Authorize and honour a single room join, answering failures with scoped
/// error events.
async fn join_conversation(hub: &RealtimeHub, connection: ConnectionId, conversation_id: &str) {
    match hub.join_conversation(connection, conversation_id).await {
        Ok(_) => {}
        Err(RealtimeError::AccessDenied(conversation)) => {
            let event = ServerEvent::Error {
                error: "ACCESS_DENIED".to_string(),
                message: format!("not a participant of conversation {conversation}"),
            };
            hub.send_to_connection(connection, event).await;
        }
        Err(RealtimeError::Store(err)) => {
            warn!(%connection, conversation = conversation_id, %err, "participant lookup failed");
            let event = ServerEvent::Error {
                error: "STORE_ERROR".to_string(),
                message: "conversation lookup failed".to_string(),
            };
            hub.send_to_connection(connection, event).await;
        }
        Err(RealtimeError::UnknownConnection) => {
            debug!(%connection, "join from unregistered connection dropped");
        }
    }
}

/// Build the ephemeral message representation and fan it out to the room,
/// sender echo included.
async fn send_message(
    hub: &RealtimeHub,
    connection: ConnectionId,
    actor: &UserSummary,
    conversation_id: String,
    content: String,
    kind: MessageKind,
) {
    let message = MessagePayload {
        id: new_message_id(),
        conversation_id: conversation_id.clone(),
        content,
        kind,
        sender: actor.clone(),
        created_at: now_rfc3339(),
        is_read: false,
    };

    match hub
        .send_message_to_conversation(&conversation_id, message)
        .await
    {
        Ok(delivered) => {
            debug!(%connection, conversation = %conversation_id, delivered, "message fanned out");
        }
        Err(err) => {
            warn!(%connection, conversation = %conversation_id, %err, "message fan-out failed");
            let event = ServerEvent::MessageError {
                error: err.to_string(),
            };
            hub.send_to_connection(connection, event).await;
        }
    }
}
