//! Ledger entries and settlement arithmetic.
//!
//! Every balance-affecting event is an immutable [`LedgerEntry`]; the sum of
//! a user's entries must always equal the cached account balance. Entries are
//! written exclusively by the ledger repository so no other component can
//! mutate balances directly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;

/// Default platform commission retained from completed orders, in percent.
pub const DEFAULT_COMMISSION_PERCENT: i64 = 10;

/// Categorisation of a balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    /// External payment credited to the balance.
    Topup,
    /// Driver's share of a completed order.
    CommissionEarning,
    /// Referrer or welcome bonus.
    ReferralBonus,
    /// Balance-bonus promo code credit.
    PromoDiscount,
    /// Funds reserved for a pending withdrawal.
    WithdrawalHold,
    /// Reversal of an earlier entry.
    Refund,
}

impl EntryCategory {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topup => "topup",
            Self::CommissionEarning => "commission_earning",
            Self::ReferralBonus => "referral_bonus",
            Self::PromoDiscount => "promo_discount",
            Self::WithdrawalHold => "withdrawal_hold",
            Self::Refund => "refund",
        }
    }
}

impl fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topup" => Ok(Self::Topup),
            "commission_earning" => Ok(Self::CommissionEarning),
            "referral_bonus" => Ok(Self::ReferralBonus),
            "promo_discount" => Ok(Self::PromoDiscount),
            "withdrawal_hold" => Ok(Self::WithdrawalHold),
            "refund" => Ok(Self::Refund),
            other => Err(format!("unknown ledger category: {other}")),
        }
    }
}

/// Immutable record of a single balance-affecting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: UserId,
    /// Signed amount in RUB minor units; positive credits, negative debits.
    pub amount_kopecks: i64,
    pub category: EntryCategory,
    pub description: String,
    /// External payment reference; unique across all entries when present,
    /// which is what makes webhook replays idempotent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A credit to be applied atomically alongside another write.
///
/// Used where a ledger entry must land in the same transaction as a state
/// change elsewhere (order completion, payment settlement, promo claims).
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCredit {
    pub user_id: UserId,
    /// Positive amount in RUB minor units.
    pub amount_kopecks: i64,
    pub category: EntryCategory,
    pub description: String,
    pub payment_ref: Option<String>,
}

/// Compute the driver's share of an order price after commission.
///
/// Integer arithmetic in minor units; the platform keeps the rounding
/// remainder.
pub fn driver_share(price_kopecks: i64, commission_percent: i64) -> i64 {
    price_kopecks * (100 - commission_percent) / 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1500_00, 10, 1350_00)]
    #[case(100, 10, 90)]
    #[case(99, 10, 89)]
    #[case(1, 10, 0)]
    #[case(1000, 0, 1000)]
    fn driver_share_applies_commission(
        #[case] price: i64,
        #[case] percent: i64,
        #[case] expected: i64,
    ) {
        assert_eq!(driver_share(price, percent), expected);
    }

    #[rstest]
    #[case(EntryCategory::Topup)]
    #[case(EntryCategory::CommissionEarning)]
    #[case(EntryCategory::ReferralBonus)]
    #[case(EntryCategory::PromoDiscount)]
    #[case(EntryCategory::WithdrawalHold)]
    #[case(EntryCategory::Refund)]
    fn category_string_form_round_trips(#[case] category: EntryCategory) {
        let parsed: EntryCategory = category.as_str().parse().expect("parse category");
        assert_eq!(parsed, category);
    }
}
