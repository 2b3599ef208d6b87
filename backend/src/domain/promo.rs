//! Promo codes and their effects.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What applying a promo code does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoEffect {
    /// Reduce an order's payable total by a percentage. Never touches the
    /// ledger.
    PercentDiscount,
    /// Reduce an order's payable total by a fixed amount. Never touches the
    /// ledger.
    FixedDiscount,
    /// Credit the user's balance directly.
    BalanceBonus,
}

impl PromoEffect {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PercentDiscount => "percent_discount",
            Self::FixedDiscount => "fixed_discount",
            Self::BalanceBonus => "balance_bonus",
        }
    }
}

impl fmt::Display for PromoEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromoEffect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent_discount" => Ok(Self::PercentDiscount),
            "fixed_discount" => Ok(Self::FixedDiscount),
            "balance_bonus" => Ok(Self::BalanceBonus),
            other => Err(format!("unknown promo effect: {other}")),
        }
    }
}

/// A redeemable promo code.
///
/// Codes are stored and compared case-normalized. Each user may claim a code
/// at most once, enforced by a uniqueness constraint on `(user, code)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    pub effect: PromoEffect,
    /// Percent for [`PromoEffect::PercentDiscount`], kopecks otherwise.
    pub value: i64,
    pub usage_cap: i32,
    pub used_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PromoCode {
    /// Normalise a user-supplied code for lookup.
    pub fn normalise(raw: &str) -> String {
        raw.trim().to_uppercase()
    }

    /// Whether the code can still be claimed at `now`, ignoring per-user use.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        if self.used_count >= self.usage_cap {
            return false;
        }
        match self.expires_at {
            Some(expiry) => now < expiry,
            None => true,
        }
    }

    /// Payable total after applying a discount-type effect.
    ///
    /// Balance-bonus codes leave the total untouched; their effect is a
    /// ledger credit handled elsewhere.
    pub fn discounted_total(&self, total_kopecks: i64) -> i64 {
        let discounted = match self.effect {
            PromoEffect::PercentDiscount => total_kopecks - total_kopecks * self.value / 100,
            PromoEffect::FixedDiscount => total_kopecks - self.value,
            PromoEffect::BalanceBonus => total_kopecks,
        };
        discounted.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn code(effect: PromoEffect, value: i64) -> PromoCode {
        PromoCode {
            id: Uuid::new_v4(),
            code: "WINTER25".to_owned(),
            effect,
            value,
            usage_cap: 10,
            used_count: 0,
            expires_at: None,
        }
    }

    #[rstest]
    #[case(" winter25 ", "WINTER25")]
    #[case("WINTER25", "WINTER25")]
    fn codes_are_case_normalised(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(PromoCode::normalise(raw), expected);
    }

    #[rstest]
    #[case(PromoEffect::PercentDiscount, 25, 1000_00, 750_00)]
    #[case(PromoEffect::FixedDiscount, 300_00, 1000_00, 700_00)]
    #[case(PromoEffect::FixedDiscount, 1200_00, 1000_00, 0)]
    #[case(PromoEffect::BalanceBonus, 500_00, 1000_00, 1000_00)]
    fn discounts_reduce_payable_total(
        #[case] effect: PromoEffect,
        #[case] value: i64,
        #[case] total: i64,
        #[case] expected: i64,
    ) {
        assert_eq!(code(effect, value).discounted_total(total), expected);
    }

    #[rstest]
    fn exhausted_code_is_not_claimable() {
        let mut promo = code(PromoEffect::BalanceBonus, 100_00);
        promo.used_count = promo.usage_cap;
        assert!(!promo.is_claimable(Utc::now()));
    }

    #[rstest]
    fn expired_code_is_not_claimable() {
        let mut promo = code(PromoEffect::PercentDiscount, 10);
        promo.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(!promo.is_claimable(Utc::now()));
    }

    #[rstest]
    fn fresh_code_is_claimable() {
        let mut promo = code(PromoEffect::PercentDiscount, 10);
        promo.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(promo.is_claimable(Utc::now()));
    }
}
