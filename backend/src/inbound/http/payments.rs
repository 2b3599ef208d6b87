//! Payment HTTP handlers.
//!
//! ```text
//! POST /api/v1/payments/topup
//! POST /api/v1/payments/webhook
//! ```
//!
//! The webhook endpoint is called by the payment provider, not by clients,
//! so it carries no credential header. Idempotency comes from the unique
//! payment reference, which makes unauthenticated replays harmless.

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{PaymentRepositoryError, WebhookAck, WebhookEvent, WebhookNotification};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::state::HttpState;

/// Request payload for starting a balance topup.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopupBody {
    /// Amount to credit once the provider confirms, in RUB minor units.
    pub amount_kopecks: i64,
}

/// A pending payment awaiting provider confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingPaymentBody {
    /// Provider reference quoted back by the webhook.
    pub reference: String,
    pub amount_kopecks: i64,
    pub status: String,
}

fn payment_storage_error(error: &PaymentRepositoryError) -> Error {
    tracing::error!(error = %error, "payment repository failure");
    match error {
        PaymentRepositoryError::Connection { .. } => {
            Error::service_unavailable("payment storage is unavailable")
        }
        PaymentRepositoryError::Query { .. } => Error::internal("payment storage query failed"),
    }
}

/// Create a pending topup payment for the caller.
#[utoipa::path(
    post,
    path = "/api/v1/payments/topup",
    request_body = TopupBody,
    responses(
        (status = 201, description = "Pending payment created", body = PendingPaymentBody),
        (status = 400, description = "Invalid request", body = crate::domain::Error),
        (status = 401, description = "Unauthorized", body = crate::domain::Error)
    ),
    tags = ["payments"],
    operation_id = "createTopup",
    security(("CredentialHeader" = []))
)]
#[post("/payments/topup")]
pub async fn create_topup(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<TopupBody>,
) -> ApiResult<(web::Json<PendingPaymentBody>, actix_web::http::StatusCode)> {
    if payload.amount_kopecks <= 0 {
        return Err(Error::invalid_request("topup amount must be positive"));
    }

    let reference = format!("topup-{}", Uuid::new_v4().simple());
    let payment = PaymentRecord::pending(caller.0.id, payload.amount_kopecks, reference);
    state
        .payments
        .create_pending(&payment)
        .await
        .map_err(|err| payment_storage_error(&err))?;
    tracing::info!(
        user_id = %caller.0.id,
        reference = %payment.reference,
        amount_kopecks = payment.amount_kopecks,
        "topup initiated"
    );

    Ok((
        web::Json(PendingPaymentBody {
            reference: payment.reference,
            amount_kopecks: payment.amount_kopecks,
            status: payment.status.to_string(),
        }),
        actix_web::http::StatusCode::CREATED,
    ))
}

/// Webhook notification payload sent by the payment provider.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    pub reference: String,
    /// Either `succeeded` or `canceled`.
    pub event: WebhookEvent,
}

/// Acknowledgement payload returned to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAckBody {
    pub status: WebhookAck,
}

/// Absorb a provider notification exactly once.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = WebhookBody,
    responses(
        (status = 200, description = "Notification absorbed", body = WebhookAckBody),
        (status = 400, description = "Unknown payment reference", body = crate::domain::Error)
    ),
    tags = ["payments"],
    operation_id = "paymentWebhook"
)]
#[post("/payments/webhook")]
pub async fn payment_webhook(
    state: web::Data<HttpState>,
    payload: web::Json<WebhookBody>,
) -> ApiResult<web::Json<WebhookAckBody>> {
    let payload = payload.into_inner();
    let ack = state
        .settlement
        .notify(WebhookNotification {
            reference: payload.reference,
            event: payload.event,
        })
        .await?;
    Ok(web::Json(WebhookAckBody { status: ack }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::auth::CREDENTIAL_HEADER;
    use crate::inbound::http::test_support::{customer, test_state};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    fn app_with(
        state: HttpState,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new().app_data(web::Data::new(state)).service(
            web::scope("/api/v1")
                .service(create_topup)
                .service(payment_webhook),
        )
    }

    #[actix_web::test]
    async fn topup_round_trip_credits_once_despite_replays() {
        let (state, store) = test_state();
        let user = customer(&store, 1);
        let app = test::init_service(app_with(state)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/payments/topup")
            .insert_header((CREDENTIAL_HEADER, user.credential.as_str()))
            .set_json(TopupBody {
                amount_kopecks: 750_00,
            })
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let pending: PendingPaymentBody = test::read_body_json(res).await;
        assert_eq!(pending.status, "pending");

        let webhook = || {
            test::TestRequest::post()
                .uri("/api/v1/payments/webhook")
                .set_json(WebhookBody {
                    reference: pending.reference.clone(),
                    event: WebhookEvent::Succeeded,
                })
                .to_request()
        };

        let res = test::call_service(&app, webhook()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let ack: WebhookAckBody = test::read_body_json(res).await;
        assert_eq!(ack.status, WebhookAck::Applied);

        let res = test::call_service(&app, webhook()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let ack: WebhookAckBody = test::read_body_json(res).await;
        assert_eq!(ack.status, WebhookAck::AlreadyApplied);

        let account = store.user(&user.user.id).expect("user exists");
        assert_eq!(account.balance_kopecks, 750_00);
    }

    #[actix_web::test]
    async fn unknown_reference_is_a_bad_request() {
        let (state, _store) = test_state();
        let app = test::init_service(app_with(state)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/payments/webhook")
            .set_json(WebhookBody {
                reference: "ghost".to_owned(),
                event: WebhookEvent::Succeeded,
            })
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn non_positive_topup_amount_is_rejected() {
        let (state, store) = test_state();
        let user = customer(&store, 1);
        let app = test::init_service(app_with(state)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/payments/topup")
            .insert_header((CREDENTIAL_HEADER, user.credential.as_str()))
            .set_json(TopupBody { amount_kopecks: 0 })
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
