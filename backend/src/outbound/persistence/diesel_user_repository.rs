//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.
//!
//! First sight of an external identity creates the account; later sightings
//! refresh only the profile fields the credential asserts. The upsert keyed
//! on `external_id` makes concurrent first logins converge on one row.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::credential::VerifiedIdentity;
use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::user::{User, UserId};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewUserRow, UserRow};
use super::pool::{DbPool, PoolError};
use super::schema::users;

/// Diesel-backed implementation of the user repository port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> UserRepositoryError {
    map_pool_error(error, UserRepositoryError::connection)
}

fn map_diesel(error: diesel::result::Error) -> UserRepositoryError {
    map_diesel_error(
        error,
        UserRepositoryError::query,
        UserRepositoryError::connection,
    )
}

fn row_to_user(row: UserRow) -> Result<User, UserRepositoryError> {
    row.into_domain().map_err(UserRepositoryError::query)
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn find_or_create(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<User, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let display_name = identity.display_name();
        let new_row = NewUserRow {
            id: Uuid::new_v4(),
            external_id: identity.external_id,
            display_name: &display_name,
            photo_url: identity.photo_url.as_deref(),
            balance_kopecks: 0,
            is_admin: false,
            driver_categories: Vec::new(),
        };

        let row: UserRow = diesel::insert_into(users::table)
            .values(&new_row)
            .on_conflict(users::external_id)
            .do_update()
            .set((
                users::display_name.eq(&display_name),
                users::photo_url.eq(identity.photo_url.as_deref()),
            ))
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel)?;

        row_to_user(row)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;

        let row: Option<UserRow> = users::table
            .filter(users::id.eq(id.as_uuid()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;

        row.map(row_to_user).transpose()
    }
}
