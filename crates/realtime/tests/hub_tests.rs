//! Integration tests for the realtime hub and dispatcher.
//!
//! These drive the core the way the websocket transport does: register a
//! connection, feed client events through `dispatch`, and observe what comes
//! out of each connection's event stream.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;

use swapmeet_realtime::{
    dispatch, ClientEvent, ConnectionId, ConversationStore, MessageKind, PresenceStatus,
    RealtimeHub, ServerEvent, StoreError, UserSummary,
};

struct AllowAllStore;

#[async_trait]
impl ConversationStore for AllowAllStore {
    async fn is_participant(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        Ok(true)
    }
}

struct FixedStore {
    allowed: HashSet<(String, String)>,
}

impl FixedStore {
    fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            allowed: pairs
                .iter()
                .map(|(c, u)| (c.to_string(), u.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ConversationStore for FixedStore {
    async fn is_participant(&self, conversation: &str, user: &str) -> Result<bool, StoreError> {
        Ok(self
            .allowed
            .contains(&(conversation.to_string(), user.to_string())))
    }
}

fn open_hub() -> RealtimeHub {
    RealtimeHub::new(Arc::new(AllowAllStore), 100)
}

struct TestClient {
    connection: ConnectionId,
    events: Receiver<ServerEvent>,
}

async fn connect(hub: &RealtimeHub, id: &str) -> TestClient {
    let user = UserSummary {
        id: id.to_string(),
        name: id.to_uppercase(),
        avatar: None,
    };
    let (connection, events) = hub.register(user).await;
    TestClient { connection, events }
}

impl TestClient {
    async fn expect_event(&mut self) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(1), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    fn assert_no_events(&mut self) {
        let drained = self.drain();
        assert!(drained.is_empty(), "unexpected events: {drained:?}");
    }
}

async fn join(hub: &RealtimeHub, client: &TestClient, conversation: &str) {
    dispatch(
        hub,
        client.connection,
        ClientEvent::JoinConversation {
            conversation_id: conversation.to_string(),
        },
    )
    .await;
}

async fn send_text(hub: &RealtimeHub, client: &TestClient, conversation: &str, content: &str) {
    dispatch(
        hub,
        client.connection,
        ClientEvent::SendMessage {
            conversation_id: conversation.to_string(),
            content: content.to_string(),
            kind: MessageKind::Text,
        },
    )
    .await;
}

#[tokio::test]
async fn connected_users_match_live_connections() {
    let hub = open_hub();
    assert!(hub.list_connected_users().await.is_empty());

    let alice = connect(&hub, "alice").await;
    let bob = connect(&hub, "bob").await;

    let mut online: Vec<String> = hub
        .list_connected_users()
        .await
        .into_iter()
        .map(|snapshot| snapshot.user_id)
        .collect();
    online.sort();
    assert_eq!(online, vec!["alice".to_string(), "bob".to_string()]);
    assert!(hub.is_user_online("alice").await);

    hub.disconnect(alice.connection).await;
    let online: Vec<String> = hub
        .list_connected_users()
        .await
        .into_iter()
        .map(|snapshot| snapshot.user_id)
        .collect();
    assert_eq!(online, vec!["bob".to_string()]);
    assert!(!hub.is_user_online("alice").await);

    hub.disconnect(bob.connection).await;
    assert!(hub.list_connected_users().await.is_empty());
}

#[tokio::test]
async fn presence_announcements_skip_the_arriving_user() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    // Alice hears about bob, bob does not hear about himself.
    match alice.expect_event().await {
        ServerEvent::UserOnline { user_id, user } => {
            assert_eq!(user_id, "bob");
            assert_eq!(user.name, "BOB");
        }
        other => panic!("unexpected event {other:?}"),
    }
    bob.assert_no_events();
}

#[tokio::test]
async fn messages_stay_within_their_room() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    let mut carol = connect(&hub, "carol").await;

    join(&hub, &alice, "c1").await;
    join(&hub, &bob, "c1").await;
    join(&hub, &carol, "c2").await;
    // Carol also joins other rooms; none of them is c1.
    join(&hub, &carol, "c3").await;

    alice.drain();
    bob.drain();
    carol.drain();

    send_text(&hub, &alice, "c1", "hello").await;

    match bob.expect_event().await {
        ServerEvent::NewMessage { message } => assert_eq!(message.content, "hello"),
        other => panic!("unexpected event {other:?}"),
    }
    carol.assert_no_events();
}

#[tokio::test]
async fn chat_round_trip_includes_sender_echo() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    join(&hub, &alice, "c1").await;
    join(&hub, &bob, "c1").await;
    alice.drain();
    bob.drain();

    send_text(&hub, &alice, "c1", "hello").await;

    let received = match bob.expect_event().await {
        ServerEvent::NewMessage { message } => message,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(received.content, "hello");
    assert_eq!(received.sender.id, "alice");
    assert_eq!(received.kind, MessageKind::Text);
    assert_eq!(received.conversation_id, "c1");
    assert!(!received.is_read);
    assert!(!received.id.is_empty());
    assert!(!received.created_at.is_empty());

    // Unlike typing events, the sender gets its own echo.
    let echo = match alice.expect_event().await {
        ServerEvent::NewMessage { message } => message,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(echo.id, received.id);
}

#[tokio::test]
async fn typing_events_skip_the_actor() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    join(&hub, &alice, "c1").await;
    join(&hub, &bob, "c1").await;
    alice.drain();
    bob.drain();

    dispatch(
        &hub,
        alice.connection,
        ClientEvent::TypingStart {
            conversation_id: "c1".to_string(),
        },
    )
    .await;

    match bob.expect_event().await {
        ServerEvent::UserTyping {
            conversation_id,
            user_id,
            ..
        } => {
            assert_eq!(conversation_id, "c1");
            assert_eq!(user_id, "alice");
        }
        other => panic!("unexpected event {other:?}"),
    }

    dispatch(
        &hub,
        alice.connection,
        ClientEvent::TypingStop {
            conversation_id: "c1".to_string(),
        },
    )
    .await;

    match bob.expect_event().await {
        ServerEvent::UserStopTyping { user_id, .. } => assert_eq!(user_id, "alice"),
        other => panic!("unexpected event {other:?}"),
    }

    alice.assert_no_events();
}

#[tokio::test]
async fn read_receipts_skip_the_actor() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    join(&hub, &alice, "c1").await;
    join(&hub, &bob, "c1").await;
    alice.drain();
    bob.drain();

    dispatch(
        &hub,
        alice.connection,
        ClientEvent::MarkMessagesRead {
            conversation_id: "c1".to_string(),
            message_ids: vec!["m1".to_string(), "m2".to_string()],
        },
    )
    .await;

    match bob.expect_event().await {
        ServerEvent::MessagesRead {
            conversation_id,
            message_ids,
            read_by,
        } => {
            assert_eq!(conversation_id, "c1");
            assert_eq!(message_ids, vec!["m1".to_string(), "m2".to_string()]);
            assert_eq!(read_by, "alice");
        }
        other => panic!("unexpected event {other:?}"),
    }
    alice.assert_no_events();
}

#[tokio::test]
async fn repeated_joins_deliver_once() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    // Bulk join plus two redundant single joins.
    dispatch(
        &hub,
        alice.connection,
        ClientEvent::JoinConversations {
            conversation_ids: vec!["c1".to_string(), "c2".to_string()],
        },
    )
    .await;
    join(&hub, &alice, "c1").await;
    join(&hub, &alice, "c1").await;
    join(&hub, &bob, "c1").await;

    // Leaving a room never joined is not an error.
    dispatch(
        &hub,
        alice.connection,
        ClientEvent::LeaveConversation {
            conversation_id: "never-joined".to_string(),
        },
    )
    .await;

    alice.drain();
    bob.drain();

    send_text(&hub, &bob, "c1", "once").await;

    match alice.expect_event().await {
        ServerEvent::NewMessage { message } => assert_eq!(message.content, "once"),
        other => panic!("unexpected event {other:?}"),
    }
    alice.assert_no_events();
}

#[tokio::test]
async fn disconnect_clears_memberships_and_presence() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    join(&hub, &alice, "c1").await;
    join(&hub, &alice, "c2").await;
    join(&hub, &bob, "c1").await;
    dispatch(&hub, alice.connection, ClientEvent::SubscribeNotifications).await;
    assert_eq!(hub.rooms_of_connection(alice.connection).await.len(), 3);

    alice.drain();
    bob.drain();

    hub.disconnect(alice.connection).await;

    match bob.expect_event().await {
        ServerEvent::UserOffline {
            user_id,
            last_seen_at,
        } => {
            assert_eq!(user_id, "alice");
            assert!(!last_seen_at.is_empty());
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(hub.rooms_of_connection(alice.connection).await.is_empty());
    assert!(!hub.is_user_online("alice").await);

    // A message to the old room no longer reaches the closed connection.
    send_text(&hub, &bob, "c1", "anyone there?").await;
    alice.drain();
    assert!(matches!(
        alice.events.try_recv(),
        Err(TryRecvError::Disconnected)
    ));
}

#[tokio::test]
async fn unauthorized_join_gets_scoped_error() {
    let store = FixedStore::new(&[("c1", "alice")]);
    let hub = RealtimeHub::new(Arc::new(store), 100);
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    join(&hub, &alice, "c1").await;
    join(&hub, &bob, "c1").await;

    alice.drain();
    match bob.drain().as_slice() {
        [ServerEvent::Error { error, .. }] => assert_eq!(error, "ACCESS_DENIED"),
        other => panic!("expected a single access error, got {other:?}"),
    }

    send_text(&hub, &alice, "c1", "private").await;

    // Alice gets her echo; bob never joined, so he sees nothing.
    match alice.expect_event().await {
        ServerEvent::NewMessage { message } => assert_eq!(message.content, "private"),
        other => panic!("unexpected event {other:?}"),
    }
    bob.assert_no_events();
}

#[tokio::test]
async fn stale_disconnect_keeps_newer_session() {
    let hub = open_hub();
    let first = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    let _second = connect(&hub, "alice").await;
    bob.drain();

    // The overwritten connection's cleanup runs late; alice is still online
    // through her newer connection and nobody hears an offline event.
    hub.disconnect(first.connection).await;
    assert!(hub.is_user_online("alice").await);
    assert_eq!(hub.list_connected_users().await.len(), 2);
    bob.assert_no_events();
}

#[tokio::test]
async fn notifications_reach_private_room_only() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;

    dispatch(&hub, alice.connection, ClientEvent::SubscribeNotifications).await;
    alice.drain();
    bob.drain();

    let payload = serde_json::json!({ "kind": "review_created", "listing": "listing-42" });
    hub.send_notification_to_user("alice", payload.clone())
        .await
        .unwrap();

    match alice.expect_event().await {
        ServerEvent::NewNotification { payload: received } => assert_eq!(received, payload),
        other => panic!("unexpected event {other:?}"),
    }
    bob.assert_no_events();

    // Bob never subscribed; a notification addressed to him goes nowhere.
    let delivered = hub
        .send_notification_to_user("bob", serde_json::json!({ "kind": "noop" }))
        .await
        .unwrap();
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn status_update_reaches_other_users() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    alice.drain();
    bob.drain();

    dispatch(
        &hub,
        alice.connection,
        ClientEvent::UpdateStatus {
            status: PresenceStatus::Trading,
        },
    )
    .await;

    match bob.expect_event().await {
        ServerEvent::UserStatusUpdate { user_id, status } => {
            assert_eq!(user_id, "alice");
            assert_eq!(status, PresenceStatus::Trading);
        }
        other => panic!("unexpected event {other:?}"),
    }
    alice.assert_no_events();

    let snapshot = hub.list_connected_users().await;
    let entry = snapshot
        .iter()
        .find(|snapshot| snapshot.user_id == "alice")
        .expect("alice should be listed");
    assert_eq!(entry.status, PresenceStatus::Trading);
}

#[tokio::test]
async fn ping_is_answered_to_origin_only() {
    let hub = open_hub();
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    alice.drain();
    bob.drain();

    dispatch(&hub, alice.connection, ClientEvent::Ping).await;

    assert!(matches!(alice.expect_event().await, ServerEvent::Pong));
    bob.assert_no_events();
}
