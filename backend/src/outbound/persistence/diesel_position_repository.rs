//! PostgreSQL-backed `DriverPositionRepository` implementation using Diesel
//! ORM. Each driver keeps exactly one live row, superseded by upsert on
//! every report.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{DriverPositionRepository, PositionRepositoryError};
use crate::domain::presence::DriverPosition;
use crate::domain::user::UserId;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::DriverPositionRow;
use super::pool::{DbPool, PoolError};
use super::schema::driver_positions;

/// Diesel-backed implementation of the driver position repository port.
#[derive(Clone)]
pub struct DieselPositionRepository {
    pool: DbPool,
}

impl DieselPositionRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> PositionRepositoryError {
    map_pool_error(error, PositionRepositoryError::connection)
}

fn map_diesel(error: diesel::result::Error) -> PositionRepositoryError {
    map_diesel_error(
        error,
        PositionRepositoryError::query,
        PositionRepositoryError::connection,
    )
}

#[async_trait]
impl DriverPositionRepository for DieselPositionRepository {
    async fn upsert(&self, position: &DriverPosition) -> Result<(), PositionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row = DriverPositionRow::from_domain(position);
        diesel::insert_into(driver_positions::table)
            .values(&row)
            .on_conflict(driver_positions::driver_id)
            .do_update()
            .set((
                driver_positions::latitude.eq(row.latitude),
                driver_positions::longitude.eq(row.longitude),
                driver_positions::updated_at.eq(row.updated_at),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel)?;
        Ok(())
    }

    async fn find(
        &self,
        driver_id: &UserId,
    ) -> Result<Option<DriverPosition>, PositionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row: Option<DriverPositionRow> = driver_positions::table
            .filter(driver_positions::driver_id.eq(driver_id.as_uuid()))
            .select(DriverPositionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;

        Ok(row.map(DriverPositionRow::into_domain))
    }
}
