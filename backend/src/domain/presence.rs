//! Live driver positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// A driver's most recent reported position.
///
/// One live row per driver with upsert semantics; superseded on every update
/// and never historized. Only the driver's own connection writes it, so there
/// is no cross-writer contention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPosition {
    pub driver_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

impl DriverPosition {
    /// Record a position reported now.
    pub fn reported(driver_id: UserId, latitude: f64, longitude: f64) -> Self {
        Self {
            driver_id,
            latitude,
            longitude,
            updated_at: Utc::now(),
        }
    }
}
