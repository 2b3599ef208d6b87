//! External payment records reconciled by the settlement gateway.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;

/// Processing state of an external payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Canceled,
}

impl PaymentStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// An in-flight or settled payment initiated with the external provider.
///
/// The `reference` is the provider's identifier quoted back in webhook
/// notifications; it is unique per payment and doubles as the idempotency
/// guard for ledger credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: UserId,
    /// Positive amount in RUB minor units.
    pub amount_kopecks: i64,
    pub reference: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Create a pending payment awaiting provider confirmation.
    pub fn pending(user_id: UserId, amount_kopecks: i64, reference: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount_kopecks,
            reference: reference.into(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
