//! Domain ports.
//!
//! Driving ports (`IdentityDirectory`, `OrderDispatch`, `BonusCommand`,
//! `SettlementWebhook`, `PresenceChannel`) are the operations the inbound
//! adapters call. Driven ports (the `*Repository` traits) are what the
//! domain services call out to; the PostgreSQL adapters under
//! `outbound::persistence` and the [`memory::InMemoryStore`] both implement
//! them.

mod macros;

pub mod bonus_command;
pub mod identity_directory;
pub mod ledger_repository;
pub mod memory;
pub mod order_dispatch;
pub mod order_repository;
pub mod payment_repository;
pub mod position_repository;
pub mod presence_channel;
pub mod promo_repository;
pub mod referral_repository;
pub mod settlement_webhook;
pub mod user_repository;

pub(crate) use macros::define_port_error;

pub use bonus_command::{BonusCommand, PromoApplication};
pub use identity_directory::IdentityDirectory;
pub use ledger_repository::{
    CreditOutcome, DebitOutcome, LedgerRepository, LedgerRepositoryError,
};
pub use memory::InMemoryStore;
pub use order_dispatch::{CreateOrderRequest, OrderDispatch};
pub use order_repository::{
    AcceptOutcome, CancelOutcome, CompleteOutcome, OrderRepository, OrderRepositoryError,
};
pub use payment_repository::{
    CancelSettleOutcome, PaymentRepository, PaymentRepositoryError, SettleOutcome,
};
pub use position_repository::{DriverPositionRepository, PositionRepositoryError};
pub use presence_channel::{PositionUpdate, PresenceChannel};
pub use promo_repository::{PromoClaim, PromoRepository, PromoRepositoryError};
pub use referral_repository::{ReferralOutcome, ReferralRepository, ReferralRepositoryError};
pub use settlement_webhook::{
    SettlementWebhook, WebhookAck, WebhookEvent, WebhookNotification,
};
pub use user_repository::{UserRepository, UserRepositoryError};
