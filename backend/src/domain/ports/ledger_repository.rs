//! Port abstraction for the append-only ledger.
//!
//! The cached balance on the user row is updated transactionally alongside
//! every entry insert; it is never recomputed by summing entries in the hot
//! path, but the two must reconcile under audit.

use async_trait::async_trait;

use crate::domain::ledger::{EntryCategory, LedgerCredit, LedgerEntry};
use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by ledger repository adapters.
    pub enum LedgerRepositoryError {
        /// Repository connection could not be established.
        Connection => "ledger repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "ledger repository query failed: {message}",
    }
}

/// Result of applying a credit.
#[derive(Debug, Clone, PartialEq)]
pub enum CreditOutcome {
    /// Entry written and cached balance bumped.
    Applied(LedgerEntry),
    /// An entry with the same external payment reference already exists; the
    /// operation was a no-op.
    DuplicateReference,
}

/// Result of applying a debit.
#[derive(Debug, Clone, PartialEq)]
pub enum DebitOutcome {
    Applied(LedgerEntry),
    /// The resulting balance would have gone negative; nothing was written.
    InsufficientBalance,
}

/// Port for balance-affecting writes and ledger reads.
///
/// This is the only component allowed to mutate user balances.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Atomically append a credit entry and bump the cached balance.
    ///
    /// When the credit carries an external payment reference, replays of the
    /// same reference yield [`CreditOutcome::DuplicateReference`] without
    /// touching the balance.
    async fn credit(&self, credit: &LedgerCredit) -> Result<CreditOutcome, LedgerRepositoryError>;

    /// Atomically append a debit entry and reduce the cached balance, unless
    /// the balance would go negative.
    async fn debit(
        &self,
        user_id: &UserId,
        amount_kopecks: i64,
        category: EntryCategory,
        description: &str,
    ) -> Result<DebitOutcome, LedgerRepositoryError>;

    /// All entries for a user, oldest first.
    async fn entries_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError>;

    /// The cached balance as stored on the user row.
    async fn balance_of(&self, user_id: &UserId) -> Result<i64, LedgerRepositoryError>;
}
