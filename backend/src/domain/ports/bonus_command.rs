//! Driving port for promo codes and referral bonuses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Error;
use crate::domain::user::{User, UserId};

/// Outcome of applying a promo code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoApplication {
    /// Normalised code that was applied.
    pub code: String,
    /// Discounted payable total for discount-type codes, when the caller
    /// supplied an order total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payable_total_kopecks: Option<i64>,
    /// Amount credited to the balance for bonus-type codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credited_kopecks: Option<i64>,
}

/// Driving port for bonus operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BonusCommand: Send + Sync {
    /// Apply a promo code for the caller.
    ///
    /// Discount-type codes reduce `order_total_kopecks` and never touch the
    /// ledger. Balance-bonus codes credit the caller and claim the per-user
    /// usage exactly once; a second application fails with a conflict.
    async fn apply_promocode(
        &self,
        caller: &User,
        code: &str,
        order_total_kopecks: Option<i64>,
    ) -> Result<PromoApplication, Error>;

    /// Bind the caller to a referrer and pay out both referral bonuses. A
    /// user can be referred exactly once.
    async fn register_referral(&self, caller: &User, referrer_id: UserId) -> Result<(), Error>;
}
