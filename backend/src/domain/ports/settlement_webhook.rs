//! Driving port for asynchronous payment-provider notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Error;

/// Terminal event reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    Succeeded,
    Canceled,
}

/// A provider notification identified by payment reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookNotification {
    pub reference: String,
    pub event: WebhookEvent,
}

/// How a notification was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    /// The notification changed state (and credited the ledger on success).
    Applied,
    /// A replay of an already-final payment; accepted but a no-op.
    AlreadyApplied,
}

/// Driving port for webhook reconciliation.
///
/// Unknown references are rejected with an invalid-request error; replays of
/// already-settled payments acknowledge without writing anything.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementWebhook: Send + Sync {
    /// Reconcile one provider notification against the ledger exactly once.
    async fn notify(&self, notification: WebhookNotification) -> Result<WebhookAck, Error>;
}
