//! The `/ws` endpoint: handshake authentication and the per-connection pump.
//!
//! The bearer credential is verified *before* the upgrade completes; a
//! missing or invalid credential fails the handshake and no connection is
//! ever registered with the hub.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use swapmeet_realtime::{dispatch, ClientEvent, ServerEvent, UserSummary};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// Realtime WebSocket connection handler
pub async fn realtime_websocket_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<WebSocketQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> GatewayResult<Response> {
    let token = query
        .token
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| {
            GatewayError::AuthenticationFailed("missing authentication credential".to_string())
        })?;

    let (user, _session) = state.authenticator().verify_credential(&token).await?;

    let summary = UserSummary {
        name: user
            .display_name
            .or(user.email)
            .unwrap_or_else(|| user.public_id.clone()),
        id: user.public_id,
        avatar: user.avatar_url,
    };

    Ok(ws.on_upgrade(move |socket| handle_realtime_socket(socket, state, summary)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Pump a registered connection: outbound hub events to the socket, inbound
/// frames through the dispatcher. Events from this connection are handled
/// serially; the hub cleanup runs whatever way the socket goes down.
async fn handle_realtime_socket(socket: WebSocket, state: Arc<GatewayState>, user: UserSummary) {
    let hub = state.hub.clone();
    let (connection, mut events) = hub.register(user.clone()).await;
    hub.send_to_connection(connection, ServerEvent::Hello { user })
        .await;

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(%err, "failed to encode server event"),
            }
        }
    });

    let receive_hub = hub.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => dispatch(&receive_hub, connection, event).await,
                    Err(err) => {
                        debug!(%connection, %err, "undecodable client event");
                        let event = ServerEvent::Error {
                            error: "INVALID_EVENT".to_string(),
                            message: "could not decode event".to_string(),
                        };
                        receive_hub.send_to_connection(connection, event).await;
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = receive_task => {},
    }

    hub.disconnect(connection).await;
}
