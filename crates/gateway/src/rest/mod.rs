//! REST API endpoints for the gateway

pub mod health;
pub mod presence;

use crate::state::GatewayState;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create all REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/presence", get(presence::list_connected_users))
}
