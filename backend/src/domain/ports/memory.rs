//! In-memory port implementations.
//!
//! One shared store implements every repository port behind a single mutex,
//! so cross-table operations (completion settlement, promo claims, webhook
//! reconciliation) are atomic the same way the PostgreSQL adapters are
//! transactional. Used by unit tests, the concurrency property tests, and
//! local development without a database.
//!
//! The mutex is never held across an await point; every operation locks,
//! mutates, and releases synchronously, which is what makes the conditional
//! updates linearizable.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::credential::VerifiedIdentity;
use crate::domain::ledger::{EntryCategory, LedgerCredit, LedgerEntry};
use crate::domain::order::{ArrivalEstimate, OrderId, OrderStatus, ServiceCategory, ServiceOrder};
use crate::domain::payment::{PaymentRecord, PaymentStatus};
use crate::domain::presence::DriverPosition;
use crate::domain::promo::PromoCode;
use crate::domain::user::{User, UserId};

use super::ledger_repository::{CreditOutcome, DebitOutcome, LedgerRepository};
use super::order_repository::{AcceptOutcome, CancelOutcome, CompleteOutcome, OrderRepository};
use super::payment_repository::{CancelSettleOutcome, PaymentRepository, SettleOutcome};
use super::position_repository::DriverPositionRepository;
use super::promo_repository::{PromoClaim, PromoRepository};
use super::referral_repository::{ReferralOutcome, ReferralRepository};
use super::user_repository::UserRepository;
use super::{
    LedgerRepositoryError, OrderRepositoryError, PaymentRepositoryError, PositionRepositoryError,
    PromoRepositoryError, ReferralRepositoryError, UserRepositoryError,
};

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    users_by_external: HashMap<i64, UserId>,
    orders: HashMap<OrderId, ServiceOrder>,
    entries: Vec<LedgerEntry>,
    positions: HashMap<UserId, DriverPosition>,
    promos: HashMap<Uuid, PromoCode>,
    promo_usages: HashSet<(UserId, Uuid)>,
    referrals: HashMap<UserId, UserId>,
    payments: HashMap<String, PaymentRecord>,
    /// Fault injection: the next settlement credit fails and the enclosing
    /// operation rolls back, mirroring a mid-transaction abort.
    fail_next_settlement: bool,
}

/// Shared in-memory backing store implementing every repository port.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed a user, indexing it by external identity.
    pub fn seed_user(&self, user: User) {
        let mut state = self.lock();
        state.users_by_external.insert(user.external_id, user.id);
        state.users.insert(user.id, user);
    }

    /// Seed a promo code.
    pub fn seed_promo(&self, promo: PromoCode) {
        self.lock().promos.insert(promo.id, promo);
    }

    /// Seed a payment record keyed by its provider reference.
    pub fn seed_payment(&self, payment: PaymentRecord) {
        self.lock()
            .payments
            .insert(payment.reference.clone(), payment);
    }

    /// Snapshot a user for assertions.
    pub fn user(&self, id: &UserId) -> Option<User> {
        self.lock().users.get(id).cloned()
    }

    /// Snapshot an order for assertions.
    pub fn order(&self, id: &OrderId) -> Option<ServiceOrder> {
        self.lock().orders.get(id).cloned()
    }

    /// Make the next settlement credit fail, forcing a rollback.
    pub fn inject_settlement_fault(&self) {
        self.lock().fail_next_settlement = true;
    }
}

/// Apply a credit under the store lock: entry append plus balance bump.
fn apply_credit(state: &mut StoreState, credit: &LedgerCredit) -> CreditOutcome {
    if let Some(reference) = &credit.payment_ref {
        let duplicate = state
            .entries
            .iter()
            .any(|entry| entry.payment_ref.as_deref() == Some(reference.as_str()));
        if duplicate {
            return CreditOutcome::DuplicateReference;
        }
    }

    let entry = LedgerEntry {
        id: Uuid::new_v4(),
        user_id: credit.user_id,
        amount_kopecks: credit.amount_kopecks,
        category: credit.category,
        description: credit.description.clone(),
        payment_ref: credit.payment_ref.clone(),
        created_at: Utc::now(),
    };
    if let Some(user) = state.users.get_mut(&credit.user_id) {
        user.balance_kopecks += credit.amount_kopecks;
    }
    state.entries.push(entry.clone());
    CreditOutcome::Applied(entry)
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_or_create(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<User, UserRepositoryError> {
        let mut state = self.lock();
        if let Some(id) = state.users_by_external.get(&identity.external_id).copied() {
            let user = state
                .users
                .get_mut(&id)
                .ok_or_else(|| UserRepositoryError::query("external index out of sync"))?;
            user.display_name = identity.display_name();
            user.photo_url = identity.photo_url.clone();
            return Ok(user.clone());
        }

        let user = User {
            id: UserId::random(),
            external_id: identity.external_id,
            display_name: identity.display_name(),
            photo_url: identity.photo_url.clone(),
            balance_kopecks: 0,
            is_admin: false,
            driver_categories: Vec::new(),
        };
        state.users_by_external.insert(user.external_id, user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.lock().users.get(id).cloned())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, order: &ServiceOrder) -> Result<(), OrderRepositoryError> {
        self.lock().orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &OrderId,
    ) -> Result<Option<ServiceOrder>, OrderRepositoryError> {
        Ok(self.lock().orders.get(id).cloned())
    }

    async fn list_searching(
        &self,
        category: ServiceCategory,
    ) -> Result<Vec<ServiceOrder>, OrderRepositoryError> {
        let state = self.lock();
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|order| order.status == OrderStatus::Searching && order.category == category)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }

    async fn accept_if_searching(
        &self,
        id: &OrderId,
        driver_id: &UserId,
        estimate: ArrivalEstimate,
    ) -> Result<AcceptOutcome, OrderRepositoryError> {
        let mut state = self.lock();
        let Some(order) = state.orders.get_mut(id) else {
            return Ok(AcceptOutcome::Unavailable);
        };
        if order.status != OrderStatus::Searching {
            return Ok(AcceptOutcome::Unavailable);
        }

        order.status = OrderStatus::Accepted;
        order.driver_id = Some(*driver_id);
        order.arrival_estimate = Some(estimate);
        Ok(AcceptOutcome::Accepted(order.clone()))
    }

    async fn complete_with_settlement(
        &self,
        id: &OrderId,
        driver_id: &UserId,
        credit: LedgerCredit,
    ) -> Result<CompleteOutcome, OrderRepositoryError> {
        let mut state = self.lock();
        let Some(order) = state.orders.get(id).cloned() else {
            return Ok(CompleteOutcome::Unavailable);
        };
        if order.status != OrderStatus::Accepted || order.driver_id.as_ref() != Some(driver_id) {
            return Ok(CompleteOutcome::Unavailable);
        }

        if state.fail_next_settlement {
            // The status flip never becomes visible: the whole operation
            // aborts, as a database transaction would.
            state.fail_next_settlement = false;
            return Err(OrderRepositoryError::query("settlement credit aborted"));
        }

        apply_credit(&mut state, &credit);
        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderRepositoryError::query("order vanished mid-update"))?;
        order.status = OrderStatus::Completed;
        Ok(CompleteOutcome::Completed(order.clone()))
    }

    async fn cancel_if_active(
        &self,
        id: &OrderId,
    ) -> Result<CancelOutcome, OrderRepositoryError> {
        let mut state = self.lock();
        let Some(order) = state.orders.get_mut(id) else {
            return Ok(CancelOutcome::Unavailable);
        };
        if order.status.is_terminal() {
            return Ok(CancelOutcome::Unavailable);
        }

        order.status = OrderStatus::Cancelled;
        Ok(CancelOutcome::Cancelled(order.clone()))
    }

    async fn accepted_order_for_driver(
        &self,
        driver_id: &UserId,
    ) -> Result<Option<ServiceOrder>, OrderRepositoryError> {
        let state = self.lock();
        Ok(state
            .orders
            .values()
            .find(|order| {
                order.status == OrderStatus::Accepted
                    && order.driver_id.as_ref() == Some(driver_id)
            })
            .cloned())
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn credit(&self, credit: &LedgerCredit) -> Result<CreditOutcome, LedgerRepositoryError> {
        let mut state = self.lock();
        Ok(apply_credit(&mut state, credit))
    }

    async fn debit(
        &self,
        user_id: &UserId,
        amount_kopecks: i64,
        category: EntryCategory,
        description: &str,
    ) -> Result<DebitOutcome, LedgerRepositoryError> {
        let mut state = self.lock();
        let Some(user) = state.users.get_mut(user_id) else {
            return Err(LedgerRepositoryError::query("user not found"));
        };
        if user.balance_kopecks < amount_kopecks {
            return Ok(DebitOutcome::InsufficientBalance);
        }

        user.balance_kopecks -= amount_kopecks;
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            user_id: *user_id,
            amount_kopecks: -amount_kopecks,
            category,
            description: description.to_owned(),
            payment_ref: None,
            created_at: Utc::now(),
        };
        state.entries.push(entry.clone());
        Ok(DebitOutcome::Applied(entry))
    }

    async fn entries_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError> {
        Ok(self
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn balance_of(&self, user_id: &UserId) -> Result<i64, LedgerRepositoryError> {
        self.lock()
            .users
            .get(user_id)
            .map(|user| user.balance_kopecks)
            .ok_or_else(|| LedgerRepositoryError::query("user not found"))
    }
}

#[async_trait]
impl PromoRepository for InMemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, PromoRepositoryError> {
        Ok(self
            .lock()
            .promos
            .values()
            .find(|promo| promo.code == code)
            .cloned())
    }

    async fn claim(
        &self,
        user_id: &UserId,
        promo_id: &Uuid,
        bonus: Option<LedgerCredit>,
    ) -> Result<PromoClaim, PromoRepositoryError> {
        let mut state = self.lock();
        if state.promo_usages.contains(&(*user_id, *promo_id)) {
            return Ok(PromoClaim::AlreadyUsed);
        }
        let Some(promo) = state.promos.get_mut(promo_id) else {
            return Err(PromoRepositoryError::query("promo code not found"));
        };
        if promo.used_count >= promo.usage_cap {
            return Ok(PromoClaim::Exhausted);
        }

        promo.used_count += 1;
        state.promo_usages.insert((*user_id, *promo_id));
        let bonus_entry = bonus.and_then(|credit| match apply_credit(&mut state, &credit) {
            CreditOutcome::Applied(entry) => Some(entry),
            CreditOutcome::DuplicateReference => None,
        });
        Ok(PromoClaim::Claimed { bonus_entry })
    }
}

#[async_trait]
impl ReferralRepository for InMemoryStore {
    async fn register(
        &self,
        referred_id: &UserId,
        referrer_id: &UserId,
        referrer_bonus: LedgerCredit,
        welcome_bonus: LedgerCredit,
    ) -> Result<ReferralOutcome, ReferralRepositoryError> {
        let mut state = self.lock();
        if state.referrals.contains_key(referred_id) {
            return Ok(ReferralOutcome::AlreadyReferred);
        }

        state.referrals.insert(*referred_id, *referrer_id);
        apply_credit(&mut state, &referrer_bonus);
        apply_credit(&mut state, &welcome_bonus);
        Ok(ReferralOutcome::Registered)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create_pending(
        &self,
        payment: &PaymentRecord,
    ) -> Result<(), PaymentRepositoryError> {
        self.lock()
            .payments
            .insert(payment.reference.clone(), payment.clone());
        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentRecord>, PaymentRepositoryError> {
        Ok(self.lock().payments.get(reference).cloned())
    }

    async fn settle_success(
        &self,
        reference: &str,
    ) -> Result<SettleOutcome, PaymentRepositoryError> {
        let mut state = self.lock();
        let Some(payment) = state.payments.get(reference).cloned() else {
            return Ok(SettleOutcome::Unknown);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled);
        }

        let credit = LedgerCredit {
            user_id: payment.user_id,
            amount_kopecks: payment.amount_kopecks,
            category: EntryCategory::Topup,
            description: format!("topup via payment {reference}"),
            payment_ref: Some(reference.to_owned()),
        };
        let outcome = apply_credit(&mut state, &credit);
        let payment = state
            .payments
            .get_mut(reference)
            .ok_or_else(|| PaymentRepositoryError::query("payment vanished mid-update"))?;
        payment.status = PaymentStatus::Succeeded;
        let payment = payment.clone();

        match outcome {
            CreditOutcome::Applied(entry) => Ok(SettleOutcome::Settled { payment, entry }),
            CreditOutcome::DuplicateReference => Ok(SettleOutcome::AlreadySettled),
        }
    }

    async fn settle_cancel(
        &self,
        reference: &str,
    ) -> Result<CancelSettleOutcome, PaymentRepositoryError> {
        let mut state = self.lock();
        let Some(payment) = state.payments.get_mut(reference) else {
            return Ok(CancelSettleOutcome::Unknown);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(CancelSettleOutcome::AlreadyFinal);
        }

        payment.status = PaymentStatus::Canceled;
        Ok(CancelSettleOutcome::Canceled(payment.clone()))
    }
}

#[async_trait]
impl DriverPositionRepository for InMemoryStore {
    async fn upsert(&self, position: &DriverPosition) -> Result<(), PositionRepositoryError> {
        self.lock()
            .positions
            .insert(position.driver_id, *position);
        Ok(())
    }

    async fn find(
        &self,
        driver_id: &UserId,
    ) -> Result<Option<DriverPosition>, PositionRepositoryError> {
        Ok(self.lock().positions.get(driver_id).copied())
    }
}
