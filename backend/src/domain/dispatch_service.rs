//! Order lifecycle orchestration.
//!
//! Authorization decisions (who may accept, complete, cancel, read) live
//! here; the race-sensitive state transitions themselves are delegated to
//! the order repository's conditional updates so they hold across service
//! instances.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::ledger::{EntryCategory, LedgerCredit, driver_share};
use crate::domain::order::{
    ArrivalEstimate, OrderId, OrderValidationError, ServiceCategory, ServiceOrder,
};
use crate::domain::ports::{
    AcceptOutcome, CancelOutcome, CompleteOutcome, CreateOrderRequest, OrderDispatch,
    OrderRepository, OrderRepositoryError,
};
use crate::domain::user::User;

/// [`OrderDispatch`] implementation over the order repository.
pub struct DispatchService {
    orders: Arc<dyn OrderRepository>,
    commission_percent: i64,
}

impl DispatchService {
    pub fn new(orders: Arc<dyn OrderRepository>, commission_percent: i64) -> Self {
        Self {
            orders,
            commission_percent,
        }
    }

    async fn load(&self, order_id: &OrderId) -> Result<ServiceOrder, Error> {
        self.orders
            .find_by_id(order_id)
            .await
            .map_err(|err| storage_error(&err))?
            .ok_or_else(|| Error::not_found("order not found"))
    }
}

fn storage_error(error: &OrderRepositoryError) -> Error {
    tracing::error!(error = %error, "order repository failure");
    match error {
        OrderRepositoryError::Connection { .. } => {
            Error::service_unavailable("order storage is unavailable")
        }
        OrderRepositoryError::Query { .. } => Error::internal("order storage query failed"),
    }
}

fn validation_error(error: OrderValidationError) -> Error {
    Error::invalid_request(error.to_string())
}

#[async_trait]
impl OrderDispatch for DispatchService {
    async fn create(
        &self,
        caller: &User,
        request: CreateOrderRequest,
    ) -> Result<ServiceOrder, Error> {
        let order = ServiceOrder::create(
            caller.id,
            request.category,
            request.location,
            request.description,
            request.price_kopecks,
        )
        .map_err(validation_error)?;

        self.orders
            .insert(&order)
            .await
            .map_err(|err| storage_error(&err))?;
        tracing::info!(
            order_id = %order.id,
            code = %order.code,
            category = %order.category,
            price_kopecks = order.price_kopecks,
            "order created"
        );
        Ok(order)
    }

    async fn accept(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error> {
        let order = self.load(&order_id).await?;
        if !caller.drives_category(order.category) {
            return Err(Error::forbidden("not a driver for this category"));
        }

        match self
            .orders
            .accept_if_searching(&order_id, &caller.id, ArrivalEstimate::advisory())
            .await
            .map_err(|err| storage_error(&err))?
        {
            AcceptOutcome::Accepted(order) => {
                tracing::info!(order_id = %order.id, driver_id = %caller.id, "order accepted");
                Ok(order)
            }
            AcceptOutcome::Unavailable => {
                tracing::debug!(order_id = %order_id, driver_id = %caller.id, "acceptance raced");
                Err(Error::conflict("order is no longer available"))
            }
        }
    }

    async fn complete(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error> {
        let order = self.load(&order_id).await?;
        if order.driver_id.as_ref() != Some(&caller.id) {
            return Err(Error::forbidden("only the bound driver may complete an order"));
        }

        let share = driver_share(order.price_kopecks, self.commission_percent);
        let credit = LedgerCredit {
            user_id: caller.id,
            amount_kopecks: share,
            category: EntryCategory::CommissionEarning,
            description: format!("settlement for order {}", order.code),
            payment_ref: None,
        };

        match self
            .orders
            .complete_with_settlement(&order_id, &caller.id, credit)
            .await
            .map_err(|err| {
                tracing::error!(order_id = %order_id, error = %err, "settlement aborted");
                storage_error(&err)
            })? {
            CompleteOutcome::Completed(order) => {
                tracing::info!(
                    order_id = %order.id,
                    driver_id = %caller.id,
                    credited_kopecks = share,
                    "order completed and settled"
                );
                Ok(order)
            }
            CompleteOutcome::Unavailable => {
                Err(Error::conflict("order is not in a completable state"))
            }
        }
    }

    async fn cancel(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error> {
        let order = self.load(&order_id).await?;
        if !order.involves(&caller.id) {
            return Err(Error::forbidden("not a party to this order"));
        }

        match self
            .orders
            .cancel_if_active(&order_id)
            .await
            .map_err(|err| storage_error(&err))?
        {
            CancelOutcome::Cancelled(order) => {
                tracing::info!(order_id = %order.id, cancelled_by = %caller.id, "order cancelled");
                Ok(order)
            }
            CancelOutcome::Unavailable => Err(Error::conflict("order already finished")),
        }
    }

    async fn get(&self, caller: &User, order_id: OrderId) -> Result<ServiceOrder, Error> {
        let order = self.load(&order_id).await?;
        if !order.involves(&caller.id) && !caller.is_admin {
            return Err(Error::forbidden("not a party to this order"));
        }
        Ok(order)
    }

    async fn list_open(
        &self,
        caller: &User,
        category: ServiceCategory,
    ) -> Result<Vec<ServiceOrder>, Error> {
        if !caller.drives_category(category) {
            return Err(Error::forbidden("not a driver for this category"));
        }
        self.orders
            .list_searching(category)
            .await
            .map_err(|err| storage_error(&err))
    }
}
