//! Credential extraction for HTTP handlers.
//!
//! Clients authenticate every request with the signed credential in the
//! `X-Auth-Credential` header; there are no cookies or server-side sessions.
//! The extractor resolves the credential through the identity directory so
//! handlers receive a ready [`User`].

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;

use crate::domain::Error;
use crate::domain::user::User;
use crate::inbound::http::state::HttpState;

/// Request header carrying the signed credential.
pub const CREDENTIAL_HEADER: &str = "X-Auth-Credential";

/// The authenticated caller, resolved from the credential header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn into_inner(self) -> User {
        self.0
    }
}

fn credential_from(req: &HttpRequest) -> Result<String, Error> {
    // Missing and malformed headers get the same generic response as a bad
    // signature.
    req.headers()
        .get(CREDENTIAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| Error::unauthorized("authentication failed"))
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let credential = credential_from(req);
        let state = req.app_data::<web::Data<HttpState>>().cloned();
        Box::pin(async move {
            let state =
                state.ok_or_else(|| Error::internal("HTTP state is not configured"))?;
            let user = state.identity.authenticate(&credential?).await?;
            Ok(Self(user))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::test_support::{test_state, towing_driver};
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test};

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.0.display_name)
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let (state, _store) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn valid_credential_resolves_the_caller() {
        let (state, store) = test_state();
        let driver = towing_driver(&store, 7);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((CREDENTIAL_HEADER, driver.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn garbage_credential_is_unauthorized() {
        let (state, _store) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((CREDENTIAL_HEADER, "auth_date=1&hash=zz"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
