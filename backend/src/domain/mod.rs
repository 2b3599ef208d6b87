//! Domain layer: entities, value types, ports, and the services that
//! implement the driving ports.
//!
//! Nothing in this module depends on actix, diesel, or any other adapter
//! concern; the inbound and outbound layers plug in through the traits in
//! [`ports`].

pub mod bonus_service;
pub mod credential;
pub mod dispatch_service;
mod error;
pub mod identity_service;
pub mod ledger;
pub mod order;
pub mod payment;
pub mod ports;
pub mod presence;
pub mod presence_service;
pub mod promo;
pub mod settlement_service;
pub mod user;

pub use bonus_service::BonusService;
pub use dispatch_service::DispatchService;
pub use error::{Error, ErrorCode};
pub use identity_service::IdentityService;
pub use presence_service::PresenceService;
pub use settlement_service::SettlementService;

/// Result alias for fallible domain operations.
pub type ApiResult<T> = Result<T, Error>;
