//! Driving port for the order lifecycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Error;
use crate::domain::order::{GeoPoint, OrderId, ServiceCategory, ServiceOrder};
use crate::domain::user::User;

/// Validated request to create a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub category: ServiceCategory,
    pub location: GeoPoint,
    pub description: String,
    /// Agreed price in RUB minor units.
    pub price_kopecks: i64,
}

/// Driving port for order state transitions and reads.
///
/// Callers pass the authenticated [`User`] so authorization decisions stay
/// inside the domain rather than in the transport adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderDispatch: Send + Sync {
    /// Create an order in the `Searching` state for the calling customer.
    async fn create(&self, caller: &User, request: CreateOrderRequest)
    -> Result<ServiceOrder, Error>;

    /// Accept a searching order as the calling driver. Exactly one of N
    /// concurrent callers succeeds; the rest observe a conflict.
    async fn accept(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error>;

    /// Complete an accepted order as its bound driver, settling the driver's
    /// commission share atomically with the status change.
    async fn complete(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error>;

    /// Cancel a non-terminal order as the customer or the bound driver. No
    /// settlement occurs.
    async fn cancel(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error>;

    /// Fetch an order the caller is a party to.
    async fn get(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error>;

    /// List searching orders in a category the calling driver serves.
    async fn list_open(
        &self,
        caller: &User,
        category: ServiceCategory,
    ) -> Result<Vec<ServiceOrder>, Error>;
}
