//! PostgreSQL-backed `LedgerRepository` implementation using Diesel ORM.
//!
//! Every balance movement writes the append-only entry and bumps the cached
//! balance on the user row in one transaction. The partial unique index on
//! `payment_ref` turns replayed external references into a duplicate outcome
//! instead of a second credit.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ledger::{EntryCategory, LedgerCredit, LedgerEntry};
use crate::domain::ports::{CreditOutcome, DebitOutcome, LedgerRepository, LedgerRepositoryError};
use crate::domain::user::UserId;

use super::diesel_error_mapping::{is_unique_violation, map_diesel_error, map_pool_error};
use super::models::{LedgerEntryRow, NewLedgerEntryRow};
use super::pool::{DbPool, PoolError};
use super::schema::{ledger_entries, users};

/// Diesel-backed implementation of the ledger repository port.
#[derive(Clone)]
pub struct DieselLedgerRepository {
    pool: DbPool,
}

impl DieselLedgerRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> LedgerRepositoryError {
    map_pool_error(error, LedgerRepositoryError::connection)
}

fn map_diesel(error: diesel::result::Error) -> LedgerRepositoryError {
    map_diesel_error(
        error,
        LedgerRepositoryError::query,
        LedgerRepositoryError::connection,
    )
}

fn row_to_entry(row: LedgerEntryRow) -> Result<LedgerEntry, LedgerRepositoryError> {
    row.into_domain().map_err(LedgerRepositoryError::query)
}

/// Append a credit entry and bump the cached balance.
///
/// Must run inside a transaction; a unique violation on `payment_ref` or a
/// missing user row aborts the caller's transaction. Shared with the order,
/// promo, referral, and payment adapters so their compound writes settle
/// balances the same way.
pub(crate) async fn insert_credit(
    conn: &mut AsyncPgConnection,
    credit: &LedgerCredit,
) -> Result<LedgerEntryRow, diesel::result::Error> {
    let entry: LedgerEntryRow = diesel::insert_into(ledger_entries::table)
        .values(NewLedgerEntryRow {
            id: Uuid::new_v4(),
            user_id: *credit.user_id.as_uuid(),
            amount_kopecks: credit.amount_kopecks,
            category: credit.category.as_str(),
            description: &credit.description,
            payment_ref: credit.payment_ref.as_deref(),
        })
        .returning(LedgerEntryRow::as_returning())
        .get_result(conn)
        .await?;

    let updated = diesel::update(users::table.filter(users::id.eq(credit.user_id.as_uuid())))
        .set(users::balance_kopecks.eq(users::balance_kopecks + credit.amount_kopecks))
        .execute(conn)
        .await?;
    if updated == 0 {
        return Err(diesel::result::Error::NotFound);
    }

    Ok(entry)
}

#[async_trait]
impl LedgerRepository for DieselLedgerRepository {
    async fn credit(&self, credit: &LedgerCredit) -> Result<CreditOutcome, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let result = conn
            .transaction::<LedgerEntryRow, diesel::result::Error, _>(|conn| {
                async move { insert_credit(conn, credit).await }.scope_boxed()
            })
            .await;

        match result {
            Ok(row) => Ok(CreditOutcome::Applied(row_to_entry(row)?)),
            Err(err) if is_unique_violation(&err) => Ok(CreditOutcome::DuplicateReference),
            Err(err) => Err(map_diesel(err)),
        }
    }

    async fn debit(
        &self,
        user_id: &UserId,
        amount_kopecks: i64,
        category: EntryCategory,
        description: &str,
    ) -> Result<DebitOutcome, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row = conn
            .transaction::<Option<LedgerEntryRow>, diesel::result::Error, _>(|conn| {
                async move {
                    // Conditional update; zero rows means the balance would
                    // have gone negative (or the user does not exist).
                    let updated = diesel::update(
                        users::table
                            .filter(users::id.eq(user_id.as_uuid()))
                            .filter(users::balance_kopecks.ge(amount_kopecks)),
                    )
                    .set(users::balance_kopecks.eq(users::balance_kopecks - amount_kopecks))
                    .execute(conn)
                    .await?;
                    if updated == 0 {
                        return Ok(None);
                    }

                    let entry: LedgerEntryRow = diesel::insert_into(ledger_entries::table)
                        .values(NewLedgerEntryRow {
                            id: Uuid::new_v4(),
                            user_id: *user_id.as_uuid(),
                            amount_kopecks: -amount_kopecks,
                            category: category.as_str(),
                            description,
                            payment_ref: None,
                        })
                        .returning(LedgerEntryRow::as_returning())
                        .get_result(conn)
                        .await?;
                    Ok(Some(entry))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel)?;

        match row {
            Some(row) => Ok(DebitOutcome::Applied(row_to_entry(row)?)),
            None => Ok(DebitOutcome::InsufficientBalance),
        }
    }

    async fn entries_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let rows: Vec<LedgerEntryRow> = ledger_entries::table
            .filter(ledger_entries::user_id.eq(user_id.as_uuid()))
            .order(ledger_entries::created_at.asc())
            .select(LedgerEntryRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel)?;

        rows.into_iter().map(row_to_entry).collect()
    }

    async fn balance_of(&self, user_id: &UserId) -> Result<i64, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        users::table
            .filter(users::id.eq(user_id.as_uuid()))
            .select(users::balance_kopecks)
            .first(&mut conn)
            .await
            .map_err(map_diesel)
    }
}
