//! HTTP inbound adapter exposing REST endpoints under `/api/v1`.

pub mod auth;
pub mod bonuses;
pub mod error;
pub mod health;
pub mod me;
pub mod orders;
pub mod payments;
pub mod state;
#[cfg(test)]
pub(crate) mod test_support;

pub use error::ApiResult;

use actix_web::web;

/// Register every versioned API route on the given service config.
pub fn configure_api(config: &mut web::ServiceConfig) {
    config.service(
        web::scope("/api/v1")
            .service(orders::create_order)
            .service(orders::list_open_orders)
            .service(orders::get_order)
            .service(orders::accept_order)
            .service(orders::complete_order)
            .service(orders::cancel_order)
            .service(bonuses::apply_promocode)
            .service(bonuses::register_referral)
            .service(payments::create_topup)
            .service(payments::payment_webhook)
            .service(me::get_profile)
            .service(me::get_ledger_history),
    );
}
