//! OpenAPI document generation for the REST API.
//!
//! [`ApiDoc`] registers every HTTP endpoint, the request and response bodies
//! they exchange, and the credential header security scheme. Swagger UI
//! serves the generated document in debug builds.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::ports::settlement_webhook::{WebhookAck, WebhookEvent};
use crate::domain::{Error, ErrorCode};
use crate::inbound::http::auth::CREDENTIAL_HEADER;
use crate::inbound::http::bonuses::{ApplyPromocodeBody, PromoApplicationBody, RegisterReferralBody};
use crate::inbound::http::me::{LedgerEntryBody, ProfileBody};
use crate::inbound::http::orders::{ArrivalEstimateBody, CreateOrderBody, OrderBody};
use crate::inbound::http::payments::{PendingPaymentBody, TopupBody, WebhookAckBody, WebhookBody};

/// Enrich the generated document with the credential header security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "CredentialHeader",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                CREDENTIAL_HEADER,
                "Signed credential issued by the messenger platform.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Roadcall backend API",
        description = "HTTP interface for roadside assistance dispatch, \
                       balances, and payment reconciliation."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("CredentialHeader" = [])),
    paths(
        crate::inbound::http::orders::create_order,
        crate::inbound::http::orders::list_open_orders,
        crate::inbound::http::orders::get_order,
        crate::inbound::http::orders::accept_order,
        crate::inbound::http::orders::complete_order,
        crate::inbound::http::orders::cancel_order,
        crate::inbound::http::bonuses::apply_promocode,
        crate::inbound::http::bonuses::register_referral,
        crate::inbound::http::payments::create_topup,
        crate::inbound::http::payments::payment_webhook,
        crate::inbound::http::me::get_profile,
        crate::inbound::http::me::get_ledger_history,
        crate::inbound::http::health::live,
        crate::inbound::http::health::ready,
    ),
    components(schemas(
        CreateOrderBody,
        OrderBody,
        ArrivalEstimateBody,
        ApplyPromocodeBody,
        PromoApplicationBody,
        RegisterReferralBody,
        TopupBody,
        PendingPaymentBody,
        WebhookBody,
        WebhookAckBody,
        WebhookEvent,
        WebhookAck,
        ProfileBody,
        LedgerEntryBody,
        Error,
        ErrorCode,
    )),
    tags(
        (name = "orders", description = "Order lifecycle operations"),
        (name = "bonuses", description = "Promo codes and referrals"),
        (name = "payments", description = "Balance topups and provider webhooks"),
        (name = "profile", description = "Authenticated account information"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_registers_every_order_operation() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/api/v1/orders",
            "/api/v1/orders/open",
            "/api/v1/orders/{id}",
            "/api/v1/orders/{id}/accept",
            "/api/v1/orders/{id}/complete",
            "/api/v1/orders/{id}/cancel",
        ] {
            assert!(paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn credential_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components present");
        assert!(components.security_schemes.contains_key("CredentialHeader"));
    }
}
