//! Shared WebSocket adapter state.
//!
//! The entry point and session loop depend on domain ports plus the
//! in-process topic registry, keeping side effects out of the framing code.

use std::sync::Arc;

use crate::domain::ports::{IdentityDirectory, PresenceChannel};
use crate::inbound::ws::registry::TopicRegistry;

/// Dependency bundle for the WebSocket adapter.
#[derive(Clone)]
pub struct WsState {
    pub identity: Arc<dyn IdentityDirectory>,
    pub presence: Arc<dyn PresenceChannel>,
    pub registry: Arc<TopicRegistry>,
    /// Origins allowed to open a WebSocket, e.g. `https://app.example.com`.
    pub allowed_origins: Arc<Vec<url::Url>>,
}

impl WsState {
    pub fn new(
        identity: Arc<dyn IdentityDirectory>,
        presence: Arc<dyn PresenceChannel>,
        allowed_origins: Vec<url::Url>,
    ) -> Self {
        Self {
            identity,
            presence,
            registry: Arc::new(TopicRegistry::new()),
            allowed_origins: Arc::new(allowed_origins),
        }
    }
}
