//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::InternalError(_) | GatewayError::WebSocketError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<swapmeet_auth::AuthError> for GatewayError {
    fn from(error: swapmeet_auth::AuthError) -> Self {
        use swapmeet_auth::AuthError;
        match error {
            AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession
            | AuthError::InvalidCredentials
            | AuthError::UserNotFound => {
                GatewayError::AuthenticationFailed("invalid or expired credential".to_string())
            }
            other => GatewayError::InternalError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        GatewayError::InvalidRequest(format!("JSON serialization error: {}", error))
    }
}
