//! Port abstraction for promo code lookup and claims.

use async_trait::async_trait;

use crate::domain::ledger::{LedgerCredit, LedgerEntry};
use crate::domain::promo::PromoCode;
use crate::domain::user::UserId;
use uuid::Uuid;

use super::define_port_error;

define_port_error! {
    /// Errors raised by promo repository adapters.
    pub enum PromoRepositoryError {
        /// Repository connection could not be established.
        Connection => "promo repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "promo repository query failed: {message}",
    }
}

/// Result of claiming a code for a user.
#[derive(Debug, Clone, PartialEq)]
pub enum PromoClaim {
    /// Usage row created and counter bumped; `bonus_entry` is present when a
    /// balance-bonus credit was applied in the same transaction.
    Claimed { bonus_entry: Option<LedgerEntry> },
    /// A usage row for this `(user, code)` pair already exists.
    AlreadyUsed,
    /// The usage cap was reached before this claim could be counted.
    Exhausted,
}

/// Port for promo code storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromoRepository: Send + Sync {
    /// Look up a code by its normalised string form.
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, PromoRepositoryError>;

    /// Claim the code for the user: insert the usage row, bump the usage
    /// counter, and apply the optional balance-bonus credit, all in one
    /// transaction. Concurrent claims by the same user create exactly one
    /// usage row; the uniqueness constraint on `(user, code)` decides the
    /// race.
    async fn claim(
        &self,
        user_id: &UserId,
        promo_id: &Uuid,
        bonus: Option<LedgerCredit>,
    ) -> Result<PromoClaim, PromoRepositoryError>;
}
