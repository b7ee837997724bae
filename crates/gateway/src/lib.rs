//! # Swapmeet Gateway Crate
//!
//! The transport edge of the backend: a thin REST surface plus the `/ws`
//! endpoint where clients attach for real-time messaging and presence. The
//! gateway authenticates the websocket handshake against the identity
//! provider, then hands the connection to the realtime hub.
//!
//! ## Architecture
//!
//! - **REST**: health and presence listing endpoints
//! - **WebSocket**: handshake authentication and the per-connection pump
//! - **State**: shared handles to the authenticator and the realtime hub
//! - **Middleware**: CORS and request logging

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

use axum::{http::Method, middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);

    Router::new()
        .merge(rest::create_rest_routes().with_state(arc_state.clone()))
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
