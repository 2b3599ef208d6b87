//! PostgreSQL-backed `ReferralRepository` implementation using Diesel ORM.
//!
//! The binding insert and both bonus credits run in one transaction; the
//! primary key on `referred_id` decides concurrent registration attempts.

use async_trait::async_trait;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};

use crate::domain::ledger::LedgerCredit;
use crate::domain::ports::{ReferralOutcome, ReferralRepository, ReferralRepositoryError};
use crate::domain::user::UserId;

use super::diesel_error_mapping::{is_unique_violation, map_diesel_error, map_pool_error};
use super::diesel_ledger_repository::insert_credit;
use super::models::NewReferralRow;
use super::pool::{DbPool, PoolError};
use super::schema::referrals;

/// Diesel-backed implementation of the referral repository port.
#[derive(Clone)]
pub struct DieselReferralRepository {
    pool: DbPool,
}

impl DieselReferralRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> ReferralRepositoryError {
    map_pool_error(error, ReferralRepositoryError::connection)
}

fn map_diesel(error: diesel::result::Error) -> ReferralRepositoryError {
    map_diesel_error(
        error,
        ReferralRepositoryError::query,
        ReferralRepositoryError::connection,
    )
}

#[async_trait]
impl ReferralRepository for DieselReferralRepository {
    async fn register(
        &self,
        referred_id: &UserId,
        referrer_id: &UserId,
        referrer_bonus: LedgerCredit,
        welcome_bonus: LedgerCredit,
    ) -> Result<ReferralOutcome, ReferralRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let result = conn
            .transaction::<(), diesel::result::Error, _>(|conn| {
                async move {
                    diesel::insert_into(referrals::table)
                        .values(NewReferralRow {
                            referred_id: *referred_id.as_uuid(),
                            referrer_id: *referrer_id.as_uuid(),
                        })
                        .execute(conn)
                        .await?;

                    insert_credit(conn, &referrer_bonus).await?;
                    insert_credit(conn, &welcome_bonus).await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        match result {
            Ok(()) => Ok(ReferralOutcome::Registered),
            Err(err) if is_unique_violation(&err) => Ok(ReferralOutcome::AlreadyReferred),
            Err(err) => Err(map_diesel(err)),
        }
    }
}
