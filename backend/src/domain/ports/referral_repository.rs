//! Port abstraction for referral registration.

use async_trait::async_trait;

use crate::domain::ledger::LedgerCredit;
use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by referral repository adapters.
    pub enum ReferralRepositoryError {
        /// Repository connection could not be established.
        Connection => "referral repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "referral repository query failed: {message}",
    }
}

/// Result of binding a referred user to a referrer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralOutcome {
    /// Binding recorded and both bonus credits applied.
    Registered,
    /// The referred user is already bound to a referrer; nothing was written.
    AlreadyReferred,
}

/// Port for the referral binding table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Bind `referred_id` to `referrer_id` and apply the referrer and
    /// welcome bonus credits in one transaction. A user can be referred
    /// exactly once; the uniqueness constraint on the referred identity
    /// decides concurrent attempts.
    async fn register(
        &self,
        referred_id: &UserId,
        referrer_id: &UserId,
        referrer_bonus: LedgerCredit,
        welcome_bonus: LedgerCredit,
    ) -> Result<ReferralOutcome, ReferralRepositoryError>;
}
