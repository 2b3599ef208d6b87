//! User identity and account state.
//!
//! Users are created on first successful credential verification and never
//! deleted. Balances are cached on the account in RUB minor units (kopecks)
//! and may only be mutated through ledger operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::ServiceCategory;

/// Stable internal user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Application user resolved from an external identity.
///
/// ## Invariants
/// - `external_id` is unique across users and never reassigned.
/// - `balance_kopecks` always equals the sum of the user's ledger entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Identity assigned by the external provider.
    pub external_id: i64,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Cached balance in RUB minor units. Signed so audit mismatches are
    /// representable, though ledger operations never let it go negative.
    pub balance_kopecks: i64,
    pub is_admin: bool,
    /// Service categories this user may accept orders for. Empty for
    /// customers; non-empty marks the user as a driver.
    pub driver_categories: Vec<ServiceCategory>,
}

impl User {
    /// Whether the user is registered as a driver for any category.
    pub fn is_driver(&self) -> bool {
        !self.driver_categories.is_empty()
    }

    /// Whether the user may accept orders of the given category.
    pub fn drives_category(&self, category: ServiceCategory) -> bool {
        self.driver_categories.contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn customer() -> User {
        User {
            id: UserId::random(),
            external_id: 42,
            display_name: "Ada Lovelace".to_owned(),
            photo_url: None,
            balance_kopecks: 0,
            is_admin: false,
            driver_categories: Vec::new(),
        }
    }

    #[rstest]
    fn user_without_categories_is_not_a_driver() {
        assert!(!customer().is_driver());
    }

    #[rstest]
    #[case(ServiceCategory::Towing, true)]
    #[case(ServiceCategory::FuelDelivery, false)]
    fn drives_category_checks_membership(#[case] category: ServiceCategory, #[case] expected: bool) {
        let mut user = customer();
        user.driver_categories = vec![ServiceCategory::Towing];
        assert_eq!(user.drives_category(category), expected);
        assert!(user.is_driver());
    }
}
