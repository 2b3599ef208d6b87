//! Service orders and their lifecycle.
//!
//! An order moves through a strict state machine:
//!
//! ```text
//! Searching -> Accepted -> Completed
//! Searching -> Accepted -> Cancelled
//! Searching -> Cancelled
//! ```
//!
//! No transition re-enters `Searching`, and at most one driver is ever bound
//! to an order. The binding is enforced by the order repository's conditional
//! update, not by this module.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;

/// Stable order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of roadside assistance requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    VehicleWarming,
    FuelDelivery,
    Towing,
    RoadsideRepair,
}

impl ServiceCategory {
    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VehicleWarming => "vehicle_warming",
            Self::FuelDelivery => "fuel_delivery",
            Self::Towing => "towing",
            Self::RoadsideRepair => "roadside_repair",
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vehicle_warming" => Ok(Self::VehicleWarming),
            "fuel_delivery" => Ok(Self::FuelDelivery),
            "towing" => Ok(Self::Towing),
            "roadside_repair" => Ok(Self::RoadsideRepair),
            other => Err(format!("unknown service category: {other}")),
        }
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Searching,
    Accepted,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "searching" => Ok(Self::Searching),
            "accepted" => Ok(Self::Accepted),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Geographic coordinates of the stranded vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Validate and construct a coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, OrderValidationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(OrderValidationError::InvalidLocation);
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Advisory arrival window shown to the customer after acceptance.
///
/// Generated, not measured: the bounds are random within a fixed range and
/// carry no delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalEstimate {
    pub from_minutes: i16,
    pub to_minutes: i16,
}

impl ArrivalEstimate {
    /// Generate an advisory window; both bounds fall in `[5, 15]` minutes.
    pub fn advisory() -> Self {
        let mut rng = SmallRng::from_entropy();
        let from_minutes = rng.gen_range(5..=10);
        Self {
            from_minutes,
            to_minutes: from_minutes + 5,
        }
    }
}

/// Validation failures raised by order constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderValidationError {
    #[error("price must be positive")]
    NonPositivePrice,
    #[error("location is outside valid coordinate ranges")]
    InvalidLocation,
    #[error("description must not be empty")]
    EmptyDescription,
}

/// A customer's request for roadside assistance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    pub id: OrderId,
    /// Short human-readable code quoted in support conversations.
    pub code: String,
    pub customer_id: UserId,
    /// Bound driver; `None` while the order is still searching. Once set it
    /// is never reassigned.
    pub driver_id: Option<UserId>,
    pub category: ServiceCategory,
    pub location: GeoPoint,
    pub description: String,
    /// Agreed price in RUB minor units; always positive.
    pub price_kopecks: i64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_estimate: Option<ArrivalEstimate>,
    pub created_at: DateTime<Utc>,
}

impl ServiceOrder {
    /// Create a new order in the `Searching` state.
    pub fn create(
        customer_id: UserId,
        category: ServiceCategory,
        location: GeoPoint,
        description: String,
        price_kopecks: i64,
    ) -> Result<Self, OrderValidationError> {
        if price_kopecks <= 0 {
            return Err(OrderValidationError::NonPositivePrice);
        }
        if description.trim().is_empty() {
            return Err(OrderValidationError::EmptyDescription);
        }

        let id = OrderId::random();
        Ok(Self {
            code: order_code(&id),
            id,
            customer_id,
            driver_id: None,
            category,
            location,
            description,
            price_kopecks,
            status: OrderStatus::Searching,
            arrival_estimate: None,
            created_at: Utc::now(),
        })
    }

    /// Whether the given user is a party to this order.
    pub fn involves(&self, user_id: &UserId) -> bool {
        self.customer_id == *user_id || self.driver_id.as_ref() == Some(user_id)
    }
}

fn order_code(id: &OrderId) -> String {
    let simple = id.as_uuid().simple().to_string();
    format!("RC-{}", simple[..6].to_uppercase())
}
