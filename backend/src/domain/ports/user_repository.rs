//! Port abstraction for user persistence.

use async_trait::async_trait;

use crate::domain::credential::VerifiedIdentity;
use crate::domain::user::{User, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by user repository adapters.
    pub enum UserRepositoryError {
        /// Repository connection could not be established.
        Connection => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "user repository query failed: {message}",
    }
}

/// Port for user storage keyed by external identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Resolve the internal user for a verified external identity, creating
    /// one on first sight. Existing users keep their balance and driver
    /// registration; only the profile fields asserted by the credential are
    /// refreshed.
    async fn find_or_create(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<User, UserRepositoryError>;

    /// Fetch a user by internal identifier.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError>;
}
