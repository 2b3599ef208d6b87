//! Port abstraction for order persistence and its conditional transitions.
//!
//! The race-sensitive transitions are expressed as compare-and-swap style
//! operations: the adapter must only apply the write when the row still
//! satisfies the stated precondition at write time, and report a lost race
//! through the outcome enum rather than an error. An in-process mutex is not
//! an acceptable implementation strategy for the PostgreSQL adapter since
//! multiple service instances may run concurrently.

use async_trait::async_trait;

use crate::domain::ledger::LedgerCredit;
use crate::domain::order::{ArrivalEstimate, OrderId, ServiceCategory, ServiceOrder};
use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by order repository adapters.
    pub enum OrderRepositoryError {
        /// Repository connection could not be established.
        Connection => "order repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "order repository query failed: {message}",
    }
}

/// Result of a conditional `Searching -> Accepted` update.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    /// The caller won the race; the returned order carries the bound driver.
    Accepted(ServiceOrder),
    /// The order no longer exists in the `Searching` state.
    Unavailable,
}

/// Result of a conditional `Accepted -> Completed` update with settlement.
#[derive(Debug, Clone, PartialEq)]
pub enum CompleteOutcome {
    /// Status flipped and the settlement entry was written atomically.
    Completed(ServiceOrder),
    /// The order is not `Accepted` with the given driver bound.
    Unavailable,
}

/// Result of a conditional cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(ServiceOrder),
    /// The order is already in a terminal state.
    Unavailable,
}

/// Port for order storage and lifecycle transitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a freshly created order.
    async fn insert(&self, order: &ServiceOrder) -> Result<(), OrderRepositoryError>;

    /// Fetch an order by identifier.
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<ServiceOrder>, OrderRepositoryError>;

    /// List orders still searching for a driver in the given category,
    /// oldest first.
    async fn list_searching(
        &self,
        category: ServiceCategory,
    ) -> Result<Vec<ServiceOrder>, OrderRepositoryError>;

    /// Bind `driver_id` and move to `Accepted`, but only if the order is
    /// still `Searching` at write time. Exactly one of N concurrent callers
    /// observes [`AcceptOutcome::Accepted`].
    async fn accept_if_searching(
        &self,
        id: &OrderId,
        driver_id: &UserId,
        estimate: ArrivalEstimate,
    ) -> Result<AcceptOutcome, OrderRepositoryError>;

    /// Move to `Completed` and apply the settlement credit in one atomic
    /// transaction, but only if the order is `Accepted` with `driver_id`
    /// bound. Either both the status flip and the ledger entry land, or
    /// neither does.
    async fn complete_with_settlement(
        &self,
        id: &OrderId,
        driver_id: &UserId,
        credit: LedgerCredit,
    ) -> Result<CompleteOutcome, OrderRepositoryError>;

    /// Move to `Cancelled` from any non-terminal state.
    async fn cancel_if_active(&self, id: &OrderId)
    -> Result<CancelOutcome, OrderRepositoryError>;

    /// The driver's currently `Accepted` order, if any. Used to route live
    /// position updates to the right topic.
    async fn accepted_order_for_driver(
        &self,
        driver_id: &UserId,
    ) -> Result<Option<ServiceOrder>, OrderRepositoryError>;
}
