//! PostgreSQL-backed `PaymentRepository` implementation using Diesel ORM.
//!
//! Reconciliation is a conditional update on the pending status: a replayed
//! success notification affects zero rows and reports the payment's actual
//! terminal state without a second credit. The status flip and the topup
//! entry land in one transaction.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};

use crate::domain::ledger::{EntryCategory, LedgerCredit};
use crate::domain::payment::{PaymentRecord, PaymentStatus};
use crate::domain::ports::{
    CancelSettleOutcome, PaymentRepository, PaymentRepositoryError, SettleOutcome,
};
use crate::domain::user::UserId;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::diesel_ledger_repository::insert_credit;
use super::models::{LedgerEntryRow, NewPaymentRow, PaymentRow};
use super::pool::{DbPool, PoolError};
use super::schema::payments;

/// Diesel-backed implementation of the payment repository port.
#[derive(Clone)]
pub struct DieselPaymentRepository {
    pool: DbPool,
}

impl DieselPaymentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> PaymentRepositoryError {
    map_pool_error(error, PaymentRepositoryError::connection)
}

fn map_diesel(error: diesel::result::Error) -> PaymentRepositoryError {
    map_diesel_error(
        error,
        PaymentRepositoryError::query,
        PaymentRepositoryError::connection,
    )
}

fn row_to_payment(row: PaymentRow) -> Result<PaymentRecord, PaymentRepositoryError> {
    row.into_domain().map_err(PaymentRepositoryError::query)
}

/// Flip a pending payment to the given terminal status.
///
/// Returns `None` when no pending row carries the reference, leaving the
/// caller to distinguish a replay from an unknown reference.
async fn flip_pending(
    conn: &mut AsyncPgConnection,
    reference: &str,
    to: PaymentStatus,
) -> Result<Option<PaymentRow>, diesel::result::Error> {
    diesel::update(
        payments::table
            .filter(payments::reference.eq(reference))
            .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
    )
    .set(payments::status.eq(to.as_str()))
    .returning(PaymentRow::as_returning())
    .get_result(conn)
    .await
    .optional()
}

#[async_trait]
impl PaymentRepository for DieselPaymentRepository {
    async fn create_pending(
        &self,
        payment: &PaymentRecord,
    ) -> Result<(), PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        diesel::insert_into(payments::table)
            .values(NewPaymentRow::from_domain(payment))
            .execute(&mut conn)
            .await
            .map_err(map_diesel)?;
        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentRecord>, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row: Option<PaymentRow> = payments::table
            .filter(payments::reference.eq(reference))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;

        row.map(row_to_payment).transpose()
    }

    async fn settle_success(
        &self,
        reference: &str,
    ) -> Result<SettleOutcome, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let settled = conn
            .transaction::<Option<(PaymentRow, LedgerEntryRow)>, diesel::result::Error, _>(
                |conn| {
                    async move {
                        let Some(row) =
                            flip_pending(conn, reference, PaymentStatus::Succeeded).await?
                        else {
                            return Ok(None);
                        };

                        let credit = LedgerCredit {
                            user_id: UserId::from_uuid(row.user_id),
                            amount_kopecks: row.amount_kopecks,
                            category: EntryCategory::Topup,
                            description: format!("topup via payment {reference}"),
                            payment_ref: Some(reference.to_owned()),
                        };
                        let entry = insert_credit(conn, &credit).await?;
                        Ok(Some((row, entry)))
                    }
                    .scope_boxed()
                },
            )
            .await
            .map_err(map_diesel)?;

        match settled {
            Some((row, entry)) => Ok(SettleOutcome::Settled {
                payment: row_to_payment(row)?,
                entry: entry.into_domain().map_err(PaymentRepositoryError::query)?,
            }),
            None => match self.find_by_reference(reference).await? {
                Some(_) => Ok(SettleOutcome::AlreadySettled),
                None => Ok(SettleOutcome::Unknown),
            },
        }
    }

    async fn settle_cancel(
        &self,
        reference: &str,
    ) -> Result<CancelSettleOutcome, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row = flip_pending(&mut conn, reference, PaymentStatus::Canceled)
            .await
            .map_err(map_diesel)?;

        match row {
            Some(row) => Ok(CancelSettleOutcome::Canceled(row_to_payment(row)?)),
            None => match self.find_by_reference(reference).await? {
                Some(_) => Ok(CancelSettleOutcome::AlreadyFinal),
                None => Ok(CancelSettleOutcome::Unknown),
            },
        }
    }
}
