//! Port abstraction for external payment reconciliation.

use async_trait::async_trait;

use crate::domain::ledger::LedgerEntry;
use crate::domain::payment::PaymentRecord;

use super::define_port_error;

define_port_error! {
    /// Errors raised by payment repository adapters.
    pub enum PaymentRepositoryError {
        /// Repository connection could not be established.
        Connection => "payment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "payment repository query failed: {message}",
    }
}

/// Result of reconciling a success notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// Payment marked succeeded and the topup entry written atomically.
    Settled {
        payment: PaymentRecord,
        entry: LedgerEntry,
    },
    /// The payment was already succeeded; nothing was written.
    AlreadySettled,
    /// No payment carries this reference.
    Unknown,
}

/// Result of reconciling a cancellation notification.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelSettleOutcome {
    /// Payment marked canceled; no balance change.
    Canceled(PaymentRecord),
    /// The payment already reached a terminal state; nothing was written.
    AlreadyFinal,
    /// No payment carries this reference.
    Unknown,
}

/// Port for payment records keyed by provider reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Persist a pending payment awaiting provider confirmation.
    async fn create_pending(&self, payment: &PaymentRecord)
    -> Result<(), PaymentRepositoryError>;

    /// Fetch a payment by provider reference.
    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentRecord>, PaymentRepositoryError>;

    /// Mark the payment succeeded and credit the paying user's balance with
    /// a topup entry tagged with the same reference, all in one transaction.
    /// Replays of an already-succeeded payment are reported as
    /// [`SettleOutcome::AlreadySettled`] and write nothing.
    async fn settle_success(
        &self,
        reference: &str,
    ) -> Result<SettleOutcome, PaymentRepositoryError>;

    /// Mark the payment canceled. No balance change occurs.
    async fn settle_cancel(
        &self,
        reference: &str,
    ) -> Result<CancelSettleOutcome, PaymentRepositoryError>;
}
