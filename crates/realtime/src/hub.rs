//! The realtime hub: shared runtime state and fan-out.
//!
//! The hub owns the presence table, the room registry, and one outbound
//! channel per connection. Map mutations happen under a single lock with no
//! I/O in the critical section; deliveries happen after the lock is released
//! and are fire-and-forget — an event bound for a connection that is full or
//! mid-close is dropped for that connection only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use crate::connection::ConnectionId;
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::{MessagePayload, PresenceSnapshot, PresenceStatus, ServerEvent, UserSummary};
use crate::presence::PresenceTable;
use crate::rooms::{user_room, RoomRegistry};
use crate::store::ConversationStore;

struct ConnectionHandle {
    user_id: String,
    sender: mpsc::Sender<ServerEvent>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    presence: PresenceTable,
    rooms: RoomRegistry,
}

pub struct RealtimeHub {
    state: RwLock<HubState>,
    store: Arc<dyn ConversationStore>,
    channel_capacity: usize,
    next_connection: AtomicU64,
}

impl RealtimeHub {
    pub fn new(store: Arc<dyn ConversationStore>, channel_capacity: usize) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            store,
            channel_capacity,
            next_connection: AtomicU64::new(1),
        }
    }

    /// Register an authenticated connection: insert the presence entry
    /// (overwriting any prior entry for the same user) and announce
    /// `user_online` to everyone else. Returns the connection handle and the
    /// outbound event stream the transport must drain.
    pub async fn register(&self, user: UserSummary) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let connection = ConnectionId::from_raw(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.channel_capacity);

        let recipients = {
            let mut state = self.state.write().await;
            state.connections.insert(
                connection,
                ConnectionHandle {
                    user_id: user.id.clone(),
                    sender,
                },
            );
            if state.presence.register(user.clone(), connection).is_some() {
                debug!(user = %user.id, "presence entry overwritten by newer connection");
            }
            other_user_senders(&state, &user.id)
        };

        let event = ServerEvent::UserOnline {
            user_id: user.id.clone(),
            user: user.clone(),
        };
        deliver_all(&recipients, &event);

        info!(%connection, user = %user.id, "connection registered");
        (connection, receiver)
    }

    /// Tear down a connection as one cleanup unit: drop its room
    /// memberships, remove the presence entry it still owns, and announce
    /// `user_offline` to everyone else.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let (user_id, removed, recipients) = {
            let mut state = self.state.write().await;
            let Some(handle) = state.connections.remove(&connection) else {
                return;
            };
            let user_id = handle.user_id;
            state.rooms.drop_connection(connection);
            let removed = state.presence.remove_owned_by(&user_id, connection);
            let recipients = other_user_senders(&state, &user_id);
            (user_id, removed, recipients)
        };

        if let Some(entry) = removed {
            let event = ServerEvent::UserOffline {
                user_id: user_id.clone(),
                last_seen_at: entry.last_seen_at.to_rfc3339(),
            };
            deliver_all(&recipients, &event);
        }

        info!(%connection, user = %user_id, "connection closed");
    }

    /// Deliver an event to one connection. Returns false if the connection
    /// is unknown or its channel is gone.
    pub async fn send_to_connection(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        let sender = {
            let state = self.state.read().await;
            match state.connections.get(&connection) {
                Some(handle) => handle.sender.clone(),
                None => return false,
            }
        };
        deliver(&sender, &event)
    }

    /// Fan an event out to every connection in a room, optionally excluding
    /// one (the actor). Returns the number of connections addressed.
    pub async fn broadcast_to_room(
        &self,
        room: &str,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> RealtimeResult<usize> {
        let recipients: Vec<mpsc::Sender<ServerEvent>> = {
            let state = self.state.read().await;
            state
                .rooms
                .members(room)
                .into_iter()
                .filter(|member| Some(*member) != exclude)
                .filter_map(|member| {
                    state
                        .connections
                        .get(&member)
                        .map(|handle| handle.sender.clone())
                })
                .collect()
        };

        deliver_all(&recipients, event);
        Ok(recipients.len())
    }

    /// Add a connection to a room. Idempotent.
    pub async fn join_room(&self, connection: ConnectionId, room: &str) -> RealtimeResult<bool> {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(&connection) {
            return Err(RealtimeError::UnknownConnection);
        }
        Ok(state.rooms.join(connection, room))
    }

    /// Authorize a conversation join against the store, then honour it.
    /// The store call is the suspension point; no lock is held across it.
    pub async fn join_conversation(
        &self,
        connection: ConnectionId,
        conversation_id: &str,
    ) -> RealtimeResult<bool> {
        let user_id = {
            let state = self.state.read().await;
            state
                .connections
                .get(&connection)
                .map(|handle| handle.user_id.clone())
                .ok_or(RealtimeError::UnknownConnection)?
        };

        if !self.store.is_participant(conversation_id, &user_id).await? {
            return Err(RealtimeError::AccessDenied(conversation_id.to_string()));
        }

        self.join_room(connection, conversation_id).await
    }

    /// Remove a connection from a room. Leaving a room never joined is fine.
    pub async fn leave_room(&self, connection: ConnectionId, room: &str) -> bool {
        let mut state = self.state.write().await;
        state.rooms.leave(connection, room)
    }

    /// Rooms the connection currently belongs to.
    pub async fn rooms_of_connection(&self, connection: ConnectionId) -> Vec<String> {
        let state = self.state.read().await;
        state.rooms.rooms_of(connection)
    }

    /// The acting user behind a connection, as cached at registration.
    pub async fn connection_user(&self, connection: ConnectionId) -> Option<UserSummary> {
        let state = self.state.read().await;
        let handle = state.connections.get(&connection)?;
        state
            .presence
            .get(&handle.user_id)
            .map(|entry| entry.user.clone())
    }

    /// Update the caller's advertised status and announce it to everyone
    /// else. Returns the acting user id when the update applied.
    pub async fn set_status(
        &self,
        connection: ConnectionId,
        status: PresenceStatus,
    ) -> Option<String> {
        let (user_id, recipients) = {
            let mut state = self.state.write().await;
            let user_id = state.connections.get(&connection)?.user_id.clone();
            if !state.presence.set_status(&user_id, status) {
                return None;
            }
            let recipients = other_user_senders(&state, &user_id);
            (user_id, recipients)
        };

        let event = ServerEvent::UserStatusUpdate {
            user_id: user_id.clone(),
            status,
        };
        deliver_all(&recipients, &event);
        Some(user_id)
    }

    // --- collaborator surface exposed to the rest of the system ---

    /// Push an asynchronous alert to one user's private notification room.
    pub async fn send_notification_to_user(
        &self,
        user_id: &str,
        payload: serde_json::Value,
    ) -> RealtimeResult<usize> {
        self.broadcast_to_room(
            &user_room(user_id),
            &ServerEvent::NewNotification { payload },
            None,
        )
        .await
    }

    /// Fan a message out to every connection in a conversation room,
    /// including the sender's own echo.
    pub async fn send_message_to_conversation(
        &self,
        conversation_id: &str,
        message: MessagePayload,
    ) -> RealtimeResult<usize> {
        self.broadcast_to_room(conversation_id, &ServerEvent::NewMessage { message }, None)
            .await
    }

    /// Users with a currently-open, authenticated connection.
    pub async fn list_connected_users(&self) -> Vec<PresenceSnapshot> {
        let state = self.state.read().await;
        state.presence.snapshot()
    }

    pub async fn is_user_online(&self, user_id: &str) -> bool {
        let state = self.state.read().await;
        state.presence.is_online(user_id)
    }
}

fn other_user_senders(state: &HubState, user_id: &str) -> Vec<mpsc::Sender<ServerEvent>> {
    state
        .connections
        .values()
        .filter(|handle| handle.user_id != user_id)
        .map(|handle| handle.sender.clone())
        .collect()
}

/// Fire-and-forget delivery. A full or closed channel drops the event for
/// that recipient only.
fn deliver(sender: &mpsc::Sender<ServerEvent>, event: &ServerEvent) -> bool {
    match sender.try_send(event.clone()) {
        Ok(()) => true,
        Err(err) => {
            debug!(event = event.event_type_name(), %err, "dropped outbound event");
            false
        }
    }
}

fn deliver_all(recipients: &[mpsc::Sender<ServerEvent>], event: &ServerEvent) {
    for sender in recipients {
        deliver(sender, event);
    }
}

/// Stamp the server-side creation time of an ephemeral message.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
