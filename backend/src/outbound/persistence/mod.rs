//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain repository ports, backed by
//! PostgreSQL via `diesel-async` with `bb8` connection pooling.
//!
//! The adapters are thin translators between Diesel rows and domain types;
//! no business rules live here. What does live here is the concurrency
//! contract: race-sensitive transitions are conditional updates whose
//! `WHERE` clause restates the precondition, compound writes run in
//! transactions, and idempotent writes let unique constraints decide races
//! instead of checking first.

mod diesel_error_mapping;
mod diesel_ledger_repository;
mod diesel_order_repository;
mod diesel_payment_repository;
mod diesel_position_repository;
mod diesel_promo_repository;
mod diesel_referral_repository;
mod diesel_user_repository;
mod models;
mod pool;
mod schema;

pub use diesel_ledger_repository::DieselLedgerRepository;
pub use diesel_order_repository::DieselOrderRepository;
pub use diesel_payment_repository::DieselPaymentRepository;
pub use diesel_position_repository::DieselPositionRepository;
pub use diesel_promo_repository::DieselPromoRepository;
pub use diesel_referral_repository::DieselReferralRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
