//! Authenticated profile and ledger history endpoints.
//!
//! ```text
//! GET /api/v1/me
//! GET /api/v1/me/ledger
//! ```

use actix_web::{get, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ledger::LedgerEntry;
use crate::domain::ports::LedgerRepositoryError;
use crate::domain::user::User;
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::state::HttpState;

/// Profile representation of the authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub external_id: i64,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Cached balance in RUB minor units.
    pub balance_kopecks: i64,
    pub is_admin: bool,
    pub driver_categories: Vec<String>,
}

impl From<User> for ProfileBody {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            external_id: user.external_id,
            display_name: user.display_name,
            photo_url: user.photo_url,
            balance_kopecks: user.balance_kopecks,
            is_admin: user.is_admin,
            driver_categories: user
                .driver_categories
                .into_iter()
                .map(|category| category.to_string())
                .collect(),
        }
    }
}

/// Return the resolved identity of the caller, including the cached balance.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "The authenticated profile", body = ProfileBody),
        (status = 401, description = "Unauthorized", body = crate::domain::Error)
    ),
    tags = ["profile"],
    operation_id = "getProfile",
    security(("CredentialHeader" = []))
)]
#[get("/me")]
pub async fn get_profile(caller: AuthenticatedUser) -> ApiResult<web::Json<ProfileBody>> {
    Ok(web::Json(caller.into_inner().into()))
}

/// One balance movement in the caller's history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryBody {
    #[schema(format = "uuid")]
    pub id: String,
    /// Signed amount in RUB minor units.
    pub amount_kopecks: i64,
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryBody {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            amount_kopecks: entry.amount_kopecks,
            category: entry.category.to_string(),
            description: entry.description,
            payment_ref: entry.payment_ref,
            created_at: entry.created_at,
        }
    }
}

fn ledger_storage_error(error: &LedgerRepositoryError) -> Error {
    tracing::error!(error = %error, "ledger repository failure");
    match error {
        LedgerRepositoryError::Connection { .. } => {
            Error::service_unavailable("ledger storage is unavailable")
        }
        LedgerRepositoryError::Query { .. } => Error::internal("ledger storage query failed"),
    }
}

/// The caller's balance history, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/me/ledger",
    responses(
        (status = 200, description = "Ledger entries for the caller", body = [LedgerEntryBody]),
        (status = 401, description = "Unauthorized", body = crate::domain::Error)
    ),
    tags = ["profile"],
    operation_id = "getLedgerHistory",
    security(("CredentialHeader" = []))
)]
#[get("/me/ledger")]
pub async fn get_ledger_history(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
) -> ApiResult<web::Json<Vec<LedgerEntryBody>>> {
    let entries = state
        .ledger
        .entries_for_user(&caller.0.id)
        .await
        .map_err(|err| ledger_storage_error(&err))?;

    Ok(web::Json(
        entries.into_iter().map(LedgerEntryBody::from).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::auth::CREDENTIAL_HEADER;
    use crate::inbound::http::state::HttpState;
    use crate::inbound::http::test_support::{test_state, towing_driver};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn profile_reflects_the_seeded_account() {
        let (state, store) = test_state();
        let driver = towing_driver(&store, 8);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api/v1").service(get_profile)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/me")
            .insert_header((CREDENTIAL_HEADER, driver.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let profile: ProfileBody = test::read_body_json(res).await;
        assert_eq!(profile.external_id, 8);
        assert_eq!(profile.driver_categories, vec!["towing".to_owned()]);
        assert_eq!(profile.balance_kopecks, 0);
    }

    #[actix_web::test]
    async fn ledger_history_lists_entries_oldest_first() {
        use crate::domain::ledger::{EntryCategory, LedgerCredit};
        use crate::domain::ports::LedgerRepository;

        let (state, store) = test_state();
        let customer = crate::inbound::http::test_support::customer(&store, 4);
        for (amount, description) in [(500_00, "first topup"), (120_00, "second topup")] {
            store
                .credit(&LedgerCredit {
                    user_id: customer.user.id,
                    amount_kopecks: amount,
                    category: EntryCategory::Topup,
                    description: description.to_owned(),
                    payment_ref: None,
                })
                .await
                .expect("credit applies");
        }

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api/v1").service(get_ledger_history)),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/v1/me/ledger")
            .insert_header((CREDENTIAL_HEADER, customer.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let entries: Vec<LedgerEntryBody> = test::read_body_json(res).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "first topup");
        assert_eq!(entries[1].amount_kopecks, 120_00);
        assert_eq!(entries[1].category, "topup");
    }

    #[actix_web::test]
    async fn unauthenticated_profile_request_is_rejected() {
        let (state, _store): (HttpState, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(web::scope("/api/v1").service(get_profile)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/me").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
