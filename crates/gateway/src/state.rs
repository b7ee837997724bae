//! Shared application state for the gateway

use std::sync::Arc;

use swapmeet_auth::Authenticator;
use swapmeet_realtime::RealtimeHub;

/// Shared state handed to every route: the identity provider and the
/// realtime hub.
#[derive(Clone)]
pub struct GatewayState {
    pub authenticator: Arc<Authenticator>,
    pub hub: Arc<RealtimeHub>,
}

impl GatewayState {
    pub fn new(authenticator: Arc<Authenticator>, hub: Arc<RealtimeHub>) -> Self {
        Self { authenticator, hub }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }
}
