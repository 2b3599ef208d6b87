//! PostgreSQL-backed `PromoRepository` implementation using Diesel ORM.
//!
//! A claim bumps the usage counter with a conditional update (respecting the
//! cap), inserts the usage row, and applies the optional balance bonus, all
//! in one transaction. The composite primary key on `(user_id, promo_id)`
//! decides concurrent claims by the same user.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ledger::LedgerCredit;
use crate::domain::ports::{PromoClaim, PromoRepository, PromoRepositoryError};
use crate::domain::promo::PromoCode;
use crate::domain::user::UserId;

use super::diesel_error_mapping::{is_unique_violation, map_diesel_error, map_pool_error};
use super::diesel_ledger_repository::insert_credit;
use super::models::{LedgerEntryRow, NewPromoUsageRow, PromoCodeRow};
use super::pool::{DbPool, PoolError};
use super::schema::{promo_codes, promo_usages};

/// Diesel-backed implementation of the promo repository port.
#[derive(Clone)]
pub struct DieselPromoRepository {
    pool: DbPool,
}

impl DieselPromoRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> PromoRepositoryError {
    map_pool_error(error, PromoRepositoryError::connection)
}

fn map_diesel(error: diesel::result::Error) -> PromoRepositoryError {
    map_diesel_error(
        error,
        PromoRepositoryError::query,
        PromoRepositoryError::connection,
    )
}

/// Transaction-internal error that lets a cap miss roll the claim back while
/// still distinguishing it from a database failure at the call site.
#[derive(Debug)]
enum ClaimTxError {
    CapReached,
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for ClaimTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Db(error)
    }
}

#[async_trait]
impl PromoRepository for DieselPromoRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, PromoRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row: Option<PromoCodeRow> = promo_codes::table
            .filter(promo_codes::code.eq(code))
            .select(PromoCodeRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;

        row.map(|row| row.into_domain().map_err(PromoRepositoryError::query))
            .transpose()
    }

    async fn claim(
        &self,
        user_id: &UserId,
        promo_id: &Uuid,
        bonus: Option<LedgerCredit>,
    ) -> Result<PromoClaim, PromoRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let result = conn
            .transaction::<Option<LedgerEntryRow>, ClaimTxError, _>(|conn| {
                async move {
                    // Count the claim against the cap first so a miss rolls
                    // back before anything else is written.
                    let counted = diesel::update(
                        promo_codes::table
                            .filter(promo_codes::id.eq(promo_id))
                            .filter(promo_codes::used_count.lt(promo_codes::usage_cap)),
                    )
                    .set(promo_codes::used_count.eq(promo_codes::used_count + 1))
                    .execute(conn)
                    .await?;
                    if counted == 0 {
                        return Err(ClaimTxError::CapReached);
                    }

                    diesel::insert_into(promo_usages::table)
                        .values(NewPromoUsageRow {
                            user_id: *user_id.as_uuid(),
                            promo_id: *promo_id,
                        })
                        .execute(conn)
                        .await?;

                    match &bonus {
                        Some(credit) => Ok(Some(insert_credit(conn, credit).await?)),
                        None => Ok(None),
                    }
                }
                .scope_boxed()
            })
            .await;

        match result {
            Ok(Some(row)) => Ok(PromoClaim::Claimed {
                bonus_entry: Some(row.into_domain().map_err(PromoRepositoryError::query)?),
            }),
            Ok(None) => Ok(PromoClaim::Claimed { bonus_entry: None }),
            Err(ClaimTxError::CapReached) => Ok(PromoClaim::Exhausted),
            Err(ClaimTxError::Db(err)) if is_unique_violation(&err) => Ok(PromoClaim::AlreadyUsed),
            Err(ClaimTxError::Db(err)) => Err(map_diesel(err)),
        }
    }
}
