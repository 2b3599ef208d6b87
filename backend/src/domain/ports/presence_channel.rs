//! Driving port for live position publication and topic authorization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Error;
use crate::domain::order::OrderId;
use crate::domain::user::User;

/// A position update addressed to one order's topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub order_id: OrderId,
    pub latitude: f64,
    pub longitude: f64,
}

/// Driving port for the presence channel's domain decisions.
///
/// The WebSocket adapter owns the topic registry and fan-out plumbing; this
/// port decides what to persist and which topic (if any) a publish reaches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceChannel: Send + Sync {
    /// Persist the driver's position and, when the driver has an order in
    /// the `Accepted` state, return the update to fan out to that order's
    /// topic. Delivery is at-most-once and best-effort; `None` means nothing
    /// is forwarded.
    async fn publish_position(
        &self,
        caller: &User,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<PositionUpdate>, Error>;

    /// Check that the caller may subscribe to an order's topic. Only the
    /// order's customer or its bound driver is admitted.
    async fn authorize_subscription(&self, caller: &User, order_id: OrderId) -> Result<(), Error>;
}
