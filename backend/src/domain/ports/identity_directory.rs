//! Driving port for credential-based authentication.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::user::User;

/// Maps a presented credential to an internal user, creating one on first
/// sight.
///
/// Implementations must collapse every verification failure into the same
/// generic unauthorized error so callers cannot probe which check failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Verify the raw credential and resolve the internal user.
    async fn authenticate(&self, credential: &str) -> Result<User, Error>;
}
