//! PostgreSQL-backed `OrderRepository` implementation using Diesel ORM.
//!
//! The lifecycle transitions are conditional updates: the `WHERE` clause
//! restates the precondition, so a transition that lost its race affects
//! zero rows and reports `Unavailable` without a read-modify-write window.
//! Completion runs in a transaction with the settlement credit so the status
//! flip and the ledger entry land together or not at all.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};

use crate::domain::ledger::LedgerCredit;
use crate::domain::order::{ArrivalEstimate, OrderId, OrderStatus, ServiceCategory, ServiceOrder};
use crate::domain::ports::{
    AcceptOutcome, CancelOutcome, CompleteOutcome, OrderRepository, OrderRepositoryError,
};
use crate::domain::user::UserId;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::diesel_ledger_repository::insert_credit;
use super::models::{NewOrderRow, OrderRow};
use super::pool::{DbPool, PoolError};
use super::schema::service_orders;

/// Diesel-backed implementation of the order repository port.
#[derive(Clone)]
pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> OrderRepositoryError {
    map_pool_error(error, OrderRepositoryError::connection)
}

fn map_diesel(error: diesel::result::Error) -> OrderRepositoryError {
    map_diesel_error(
        error,
        OrderRepositoryError::query,
        OrderRepositoryError::connection,
    )
}

fn row_to_order(row: OrderRow) -> Result<ServiceOrder, OrderRepositoryError> {
    row.into_domain().map_err(OrderRepositoryError::query)
}

#[async_trait]
impl OrderRepository for DieselOrderRepository {
    async fn insert(&self, order: &ServiceOrder) -> Result<(), OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        diesel::insert_into(service_orders::table)
            .values(NewOrderRow::from_domain(order))
            .execute(&mut conn)
            .await
            .map_err(map_diesel)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<ServiceOrder>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row: Option<OrderRow> = service_orders::table
            .filter(service_orders::id.eq(id.as_uuid()))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;

        row.map(row_to_order).transpose()
    }

    async fn list_searching(
        &self,
        category: ServiceCategory,
    ) -> Result<Vec<ServiceOrder>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let rows: Vec<OrderRow> = service_orders::table
            .filter(service_orders::status.eq(OrderStatus::Searching.as_str()))
            .filter(service_orders::category.eq(category.as_str()))
            .order(service_orders::created_at.asc())
            .select(OrderRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel)?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn accept_if_searching(
        &self,
        id: &OrderId,
        driver_id: &UserId,
        estimate: ArrivalEstimate,
    ) -> Result<AcceptOutcome, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row: Option<OrderRow> = diesel::update(
            service_orders::table
                .filter(service_orders::id.eq(id.as_uuid()))
                .filter(service_orders::status.eq(OrderStatus::Searching.as_str())),
        )
        .set((
            service_orders::status.eq(OrderStatus::Accepted.as_str()),
            service_orders::driver_id.eq(driver_id.as_uuid()),
            service_orders::eta_from_minutes.eq(estimate.from_minutes),
            service_orders::eta_to_minutes.eq(estimate.to_minutes),
        ))
        .returning(OrderRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel)?;

        match row {
            Some(row) => Ok(AcceptOutcome::Accepted(row_to_order(row)?)),
            None => Ok(AcceptOutcome::Unavailable),
        }
    }

    async fn complete_with_settlement(
        &self,
        id: &OrderId,
        driver_id: &UserId,
        credit: LedgerCredit,
    ) -> Result<CompleteOutcome, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row = conn
            .transaction::<Option<OrderRow>, diesel::result::Error, _>(|conn| {
                async move {
                    let row: Option<OrderRow> = diesel::update(
                        service_orders::table
                            .filter(service_orders::id.eq(id.as_uuid()))
                            .filter(service_orders::status.eq(OrderStatus::Accepted.as_str()))
                            .filter(service_orders::driver_id.eq(driver_id.as_uuid())),
                    )
                    .set(service_orders::status.eq(OrderStatus::Completed.as_str()))
                    .returning(OrderRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?;

                    let Some(row) = row else {
                        return Ok(None);
                    };

                    insert_credit(conn, &credit).await?;
                    Ok(Some(row))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel)?;

        match row {
            Some(row) => Ok(CompleteOutcome::Completed(row_to_order(row)?)),
            None => Ok(CompleteOutcome::Unavailable),
        }
    }

    async fn cancel_if_active(
        &self,
        id: &OrderId,
    ) -> Result<CancelOutcome, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let terminal = [
            OrderStatus::Completed.as_str(),
            OrderStatus::Cancelled.as_str(),
        ];
        let row: Option<OrderRow> = diesel::update(
            service_orders::table
                .filter(service_orders::id.eq(id.as_uuid()))
                .filter(service_orders::status.ne_all(terminal)),
        )
        .set(service_orders::status.eq(OrderStatus::Cancelled.as_str()))
        .returning(OrderRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel)?;

        match row {
            Some(row) => Ok(CancelOutcome::Cancelled(row_to_order(row)?)),
            None => Ok(CancelOutcome::Unavailable),
        }
    }

    async fn accepted_order_for_driver(
        &self,
        driver_id: &UserId,
    ) -> Result<Option<ServiceOrder>, OrderRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row: Option<OrderRow> = service_orders::table
            .filter(service_orders::driver_id.eq(driver_id.as_uuid()))
            .filter(service_orders::status.eq(OrderStatus::Accepted.as_str()))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;

        row.map(row_to_order).transpose()
    }
}
