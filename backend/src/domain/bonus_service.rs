//! Promo code application and referral registration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::Error;
use crate::domain::ledger::{EntryCategory, LedgerCredit};
use crate::domain::ports::{
    BonusCommand, PromoApplication, PromoClaim, PromoRepository, PromoRepositoryError,
    ReferralOutcome, ReferralRepository, ReferralRepositoryError, UserRepository,
    UserRepositoryError,
};
use crate::domain::promo::PromoEffect;
use crate::domain::user::{User, UserId};

/// Credited to the referrer when a referral registers.
pub const REFERRER_BONUS_KOPECKS: i64 = 200_00;
/// Credited to the newly referred user.
pub const WELCOME_BONUS_KOPECKS: i64 = 100_00;

/// [`BonusCommand`] implementation over the promo and referral repositories.
pub struct BonusService {
    users: Arc<dyn UserRepository>,
    promos: Arc<dyn PromoRepository>,
    referrals: Arc<dyn ReferralRepository>,
}

impl BonusService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        promos: Arc<dyn PromoRepository>,
        referrals: Arc<dyn ReferralRepository>,
    ) -> Self {
        Self {
            users,
            promos,
            referrals,
        }
    }
}

fn promo_storage_error(error: &PromoRepositoryError) -> Error {
    tracing::error!(error = %error, "promo repository failure");
    match error {
        PromoRepositoryError::Connection { .. } => {
            Error::service_unavailable("promo storage is unavailable")
        }
        PromoRepositoryError::Query { .. } => Error::internal("promo storage query failed"),
    }
}

fn referral_storage_error(error: &ReferralRepositoryError) -> Error {
    tracing::error!(error = %error, "referral repository failure");
    match error {
        ReferralRepositoryError::Connection { .. } => {
            Error::service_unavailable("referral storage is unavailable")
        }
        ReferralRepositoryError::Query { .. } => Error::internal("referral storage query failed"),
    }
}

fn user_storage_error(error: &UserRepositoryError) -> Error {
    tracing::error!(error = %error, "user repository failure");
    match error {
        UserRepositoryError::Connection { .. } => {
            Error::service_unavailable("user storage is unavailable")
        }
        UserRepositoryError::Query { .. } => Error::internal("user lookup failed"),
    }
}

#[async_trait]
impl BonusCommand for BonusService {
    async fn apply_promocode(
        &self,
        caller: &User,
        code: &str,
        order_total_kopecks: Option<i64>,
    ) -> Result<PromoApplication, Error> {
        let code = crate::domain::promo::PromoCode::normalise(code);
        if code.is_empty() {
            return Err(Error::invalid_request("promo code must not be empty"));
        }

        let promo = self
            .promos
            .find_by_code(&code)
            .await
            .map_err(|err| promo_storage_error(&err))?
            .ok_or_else(|| Error::not_found("unknown promo code"))?;
        if !promo.is_claimable(Utc::now()) {
            return Err(Error::conflict("promo code is no longer claimable"));
        }

        let bonus = match promo.effect {
            PromoEffect::BalanceBonus => Some(LedgerCredit {
                user_id: caller.id,
                amount_kopecks: promo.value,
                category: EntryCategory::PromoDiscount,
                description: format!("promo code {code}"),
                payment_ref: None,
            }),
            PromoEffect::PercentDiscount | PromoEffect::FixedDiscount => None,
        };

        match self
            .promos
            .claim(&caller.id, &promo.id, bonus)
            .await
            .map_err(|err| promo_storage_error(&err))?
        {
            PromoClaim::Claimed { .. } => {}
            PromoClaim::AlreadyUsed => {
                return Err(Error::conflict("promo code already used"));
            }
            PromoClaim::Exhausted => {
                return Err(Error::conflict("promo code is no longer claimable"));
            }
        }

        tracing::info!(user_id = %caller.id, code = %code, effect = %promo.effect, "promo code applied");
        Ok(match promo.effect {
            PromoEffect::BalanceBonus => PromoApplication {
                code,
                payable_total_kopecks: None,
                credited_kopecks: Some(promo.value),
            },
            PromoEffect::PercentDiscount | PromoEffect::FixedDiscount => PromoApplication {
                code,
                payable_total_kopecks: order_total_kopecks
                    .map(|total| promo.discounted_total(total)),
                credited_kopecks: None,
            },
        })
    }

    async fn register_referral(&self, caller: &User, referrer_id: UserId) -> Result<(), Error> {
        if referrer_id == caller.id {
            return Err(Error::invalid_request("cannot refer yourself"));
        }
        self.users
            .find_by_id(&referrer_id)
            .await
            .map_err(|err| user_storage_error(&err))?
            .ok_or_else(|| Error::not_found("referrer not found"))?;

        let referrer_bonus = LedgerCredit {
            user_id: referrer_id,
            amount_kopecks: REFERRER_BONUS_KOPECKS,
            category: EntryCategory::ReferralBonus,
            description: format!("referral of user {}", caller.id),
            payment_ref: None,
        };
        let welcome_bonus = LedgerCredit {
            user_id: caller.id,
            amount_kopecks: WELCOME_BONUS_KOPECKS,
            category: EntryCategory::ReferralBonus,
            description: "referral welcome bonus".to_owned(),
            payment_ref: None,
        };

        match self
            .referrals
            .register(&caller.id, &referrer_id, referrer_bonus, welcome_bonus)
            .await
            .map_err(|err| referral_storage_error(&err))?
        {
            ReferralOutcome::Registered => {
                tracing::info!(referred = %caller.id, referrer = %referrer_id, "referral registered");
                Ok(())
            }
            ReferralOutcome::AlreadyReferred => Err(Error::conflict("user already referred")),
        }
    }
}
