//! Bonus HTTP handlers.
//!
//! ```text
//! POST /api/v1/bonuses/apply-promocode
//! POST /api/v1/bonuses/referral
//! ```

use std::str::FromStr;

use actix_web::{HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::PromoApplication;
use crate::domain::user::UserId;
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::state::HttpState;

/// Request payload for applying a promo code.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPromocodeBody {
    pub code: String,
    /// Order total the discount applies to, when relevant.
    pub order_total_kopecks: Option<i64>,
}

/// Outcome payload of a promo application.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromoApplicationBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payable_total_kopecks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credited_kopecks: Option<i64>,
}

impl From<PromoApplication> for PromoApplicationBody {
    fn from(applied: PromoApplication) -> Self {
        Self {
            code: applied.code,
            payable_total_kopecks: applied.payable_total_kopecks,
            credited_kopecks: applied.credited_kopecks,
        }
    }
}

/// Apply a promo code for the caller.
#[utoipa::path(
    post,
    path = "/api/v1/bonuses/apply-promocode",
    request_body = ApplyPromocodeBody,
    responses(
        (status = 200, description = "Promo code applied", body = PromoApplicationBody),
        (status = 404, description = "Unknown promo code", body = crate::domain::Error),
        (status = 409, description = "Code already used or no longer claimable", body = crate::domain::Error)
    ),
    tags = ["bonuses"],
    operation_id = "applyPromocode",
    security(("CredentialHeader" = []))
)]
#[post("/bonuses/apply-promocode")]
pub async fn apply_promocode(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<ApplyPromocodeBody>,
) -> ApiResult<web::Json<PromoApplicationBody>> {
    let payload = payload.into_inner();
    let applied = state
        .bonuses
        .apply_promocode(&caller.0, &payload.code, payload.order_total_kopecks)
        .await?;
    Ok(web::Json(applied.into()))
}

/// Request payload for registering a referral.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReferralBody {
    /// The referring user's identifier.
    #[schema(format = "uuid")]
    pub referrer_id: String,
}

/// Bind the caller to a referrer and pay out both bonuses.
#[utoipa::path(
    post,
    path = "/api/v1/bonuses/referral",
    request_body = RegisterReferralBody,
    responses(
        (status = 204, description = "Referral registered"),
        (status = 400, description = "Invalid request", body = crate::domain::Error),
        (status = 404, description = "Referrer not found", body = crate::domain::Error),
        (status = 409, description = "Caller already referred", body = crate::domain::Error)
    ),
    tags = ["bonuses"],
    operation_id = "registerReferral",
    security(("CredentialHeader" = []))
)]
#[post("/bonuses/referral")]
pub async fn register_referral(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<RegisterReferralBody>,
) -> ApiResult<HttpResponse> {
    let referrer_id = UserId::from_str(&payload.referrer_id).map_err(|_| {
        Error::invalid_request("referrer id must be a UUID").with_details(json!({
            "field": "referrerId",
            "value": payload.referrer_id,
            "code": "invalid_uuid",
        }))
    })?;

    state
        .bonuses
        .register_referral(&caller.0, referrer_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::promo::{PromoCode, PromoEffect};
    use crate::inbound::http::auth::CREDENTIAL_HEADER;
    use crate::inbound::http::test_support::{customer, test_state};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use uuid::Uuid;

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
                .service(apply_promocode)
                .service(register_referral),
        )
    }

    #[actix_web::test]
    async fn balance_bonus_promo_credits_and_then_conflicts() {
        let (state, store) = test_state();
        let user = customer(&store, 1);
        store.seed_promo(PromoCode {
            id: Uuid::new_v4(),
            code: "BONUS300".to_owned(),
            effect: PromoEffect::BalanceBonus,
            value: 300_00,
            usage_cap: 10,
            used_count: 0,
            expires_at: None,
        });
        let app = test::init_service(app_with(state)).await;

        let request = || {
            test::TestRequest::post()
                .uri("/api/v1/bonuses/apply-promocode")
                .insert_header((CREDENTIAL_HEADER, user.credential.as_str()))
                .set_json(ApplyPromocodeBody {
                    code: "bonus300".to_owned(),
                    order_total_kopecks: None,
                })
                .to_request()
        };

        let res = test::call_service(&app, request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: PromoApplicationBody = test::read_body_json(res).await;
        assert_eq!(body.credited_kopecks, Some(300_00));

        let res = test::call_service(&app, request()).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn referral_registers_once_then_conflicts() {
        let (state, store) = test_state();
        let referrer = customer(&store, 1);
        let referred = customer(&store, 2);
        let app = test::init_service(app_with(state)).await;

        let request = || {
            test::TestRequest::post()
                .uri("/api/v1/bonuses/referral")
                .insert_header((CREDENTIAL_HEADER, referred.credential.as_str()))
                .set_json(RegisterReferralBody {
                    referrer_id: referrer.user.id.to_string(),
                })
                .to_request()
        };

        let res = test::call_service(&app, request()).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = test::call_service(&app, request()).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn malformed_referrer_id_is_a_bad_request() {
        let (state, store) = test_state();
        let referred = customer(&store, 2);
        let app = test::init_service(app_with(state)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/bonuses/referral")
            .insert_header((CREDENTIAL_HEADER, referred.credential.as_str()))
            .set_json(RegisterReferralBody {
                referrer_id: "not-a-uuid".to_owned(),
            })
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
