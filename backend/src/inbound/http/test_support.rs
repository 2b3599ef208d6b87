//! Shared fixtures for HTTP adapter tests.
//!
//! Wires the real domain services over the in-memory store so handler tests
//! exercise the full path from credential header to persisted state.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::credential::CredentialSecret;
use crate::domain::credential::testing::sign_identity;
use crate::domain::ledger::DEFAULT_COMMISSION_PERCENT;
use crate::domain::order::ServiceCategory;
use crate::domain::ports::InMemoryStore;
use crate::domain::user::{User, UserId};
use crate::domain::{
    BonusService, DispatchService, IdentityService, PresenceService, SettlementService,
};
use crate::inbound::http::state::HttpState;

pub(crate) const TEST_SECRET: &[u8] = b"http-test-secret";

/// A seeded user together with a credential that authenticates as them.
pub(crate) struct TestUser {
    pub user: User,
    pub credential: String,
}

fn secret() -> CredentialSecret {
    CredentialSecret::new(TEST_SECRET.to_vec())
}

/// Build an [`HttpState`] whose ports all share one in-memory store.
pub(crate) fn test_state() -> (HttpState, InMemoryStore) {
    let store = InMemoryStore::new();
    let shared: Arc<InMemoryStore> = Arc::new(store.clone());
    let state = HttpState::new(
        Arc::new(IdentityService::new(secret(), shared.clone())),
        Arc::new(DispatchService::new(
            shared.clone(),
            DEFAULT_COMMISSION_PERCENT,
        )),
        Arc::new(BonusService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
        )),
        Arc::new(SettlementService::new(shared.clone())),
        shared.clone(),
        shared,
    );
    state.mark_ready();
    (state, store)
}

/// Presence service over the same store, for WS-adjacent tests.
pub(crate) fn presence_over(store: &InMemoryStore) -> PresenceService {
    let shared: Arc<InMemoryStore> = Arc::new(store.clone());
    PresenceService::new(shared.clone(), shared)
}

fn seeded(store: &InMemoryStore, external_id: i64, categories: Vec<ServiceCategory>) -> TestUser {
    let user = User {
        id: UserId::random(),
        external_id,
        // Matches the name embedded by `sign_identity`.
        display_name: "Test".to_owned(),
        photo_url: None,
        balance_kopecks: 0,
        is_admin: false,
        driver_categories: categories,
    };
    store.seed_user(user.clone());
    TestUser {
        user,
        credential: sign_identity(&secret(), external_id, Utc::now()),
    }
}

/// Seed a plain customer and mint a credential for them.
pub(crate) fn customer(store: &InMemoryStore, external_id: i64) -> TestUser {
    seeded(store, external_id, Vec::new())
}

/// Seed a towing driver and mint a credential for them.
pub(crate) fn towing_driver(store: &InMemoryStore, external_id: i64) -> TestUser {
    seeded(store, external_id, vec![ServiceCategory::Towing])
}
