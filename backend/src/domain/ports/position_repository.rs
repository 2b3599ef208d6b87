//! Port abstraction for live driver positions.

use async_trait::async_trait;

use crate::domain::presence::DriverPosition;
use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by driver position repository adapters.
    pub enum PositionRepositoryError {
        /// Repository connection could not be established.
        Connection => "position repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "position repository query failed: {message}",
    }
}

/// Port for the one-live-row-per-driver position table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriverPositionRepository: Send + Sync {
    /// Persist the driver's current position, superseding any previous row.
    async fn upsert(&self, position: &DriverPosition) -> Result<(), PositionRepositoryError>;

    /// Fetch the driver's last reported position.
    async fn find(
        &self,
        driver_id: &UserId,
    ) -> Result<Option<DriverPosition>, PositionRepositoryError>;
}
