//! Wire-level message envelopes for the WebSocket adapter.
//!
//! Frames are JSON objects discriminated by a `type` field. Inbound frames
//! come from authenticated clients; outbound frames are fanned out to order
//! topics or returned to the sender.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ports::PositionUpdate;

/// Frames accepted from clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// A driver reporting their current position.
    #[serde(rename = "driver.location")]
    #[serde(rename_all = "camelCase")]
    DriverLocation { latitude: f64, longitude: f64 },
    /// Join an order's presence topic.
    #[serde(rename = "order.subscribe")]
    #[serde(rename_all = "camelCase")]
    Subscribe { order_id: Uuid },
    /// Leave an order's presence topic.
    #[serde(rename = "order.unsubscribe")]
    #[serde(rename_all = "camelCase")]
    Unsubscribe { order_id: Uuid },
}

/// Frames emitted to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A driver position forwarded to an order topic.
    #[serde(rename = "driver.location.update")]
    #[serde(rename_all = "camelCase")]
    LocationUpdate {
        order_id: Uuid,
        latitude: f64,
        longitude: f64,
    },
    /// A request-scoped failure; the connection stays open.
    #[serde(rename = "error")]
    #[serde(rename_all = "camelCase")]
    Error { code: String, message: String },
}

impl From<PositionUpdate> for ServerMessage {
    fn from(update: PositionUpdate) -> Self {
        Self::LocationUpdate {
            order_id: *update.order_id.as_uuid(),
            latitude: update.latitude,
            longitude: update.longitude,
        }
    }
}

impl ServerMessage {
    /// Build an error frame from a domain error.
    pub fn from_error(error: &crate::domain::Error) -> Self {
        let code = serde_json::to_value(error.code())
            .ok()
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_else(|| "internal_error".to_owned());
        Self::Error {
            code,
            message: error.message().to_owned(),
        }
    }
}
