//! Presence listing: who is connected right now.

use std::sync::Arc;

use axum::{extract::State, Json};
use swapmeet_realtime::PresenceSnapshot;

use crate::state::GatewayState;

pub async fn list_connected_users(
    State(state): State<Arc<GatewayState>>,
) -> Json<Vec<PresenceSnapshot>> {
    Json(state.hub().list_connected_users().await)
}
