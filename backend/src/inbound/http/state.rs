//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on domain ports and remain testable without I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::ports::{
    BonusCommand, IdentityDirectory, LedgerRepository, OrderDispatch, PaymentRepository,
    SettlementWebhook,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub identity: Arc<dyn IdentityDirectory>,
    pub dispatch: Arc<dyn OrderDispatch>,
    pub bonuses: Arc<dyn BonusCommand>,
    pub settlement: Arc<dyn SettlementWebhook>,
    pub payments: Arc<dyn PaymentRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    readiness: Arc<AtomicBool>,
}

impl HttpState {
    /// Construct state from explicit port implementations. The service
    /// starts not-ready; call [`HttpState::mark_ready`] once outbound
    /// dependencies are wired.
    pub fn new(
        identity: Arc<dyn IdentityDirectory>,
        dispatch: Arc<dyn OrderDispatch>,
        bonuses: Arc<dyn BonusCommand>,
        settlement: Arc<dyn SettlementWebhook>,
        payments: Arc<dyn PaymentRepository>,
        ledger: Arc<dyn LedgerRepository>,
    ) -> Self {
        Self {
            identity,
            dispatch,
            bonuses,
            settlement,
            payments,
            ledger,
            readiness: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flip the readiness flag reported by `/healthz/ready`.
    pub fn mark_ready(&self) {
        self.readiness.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.load(Ordering::Acquire)
    }
}
