//! Liveness and readiness probes.
//!
//! ```text
//! GET /healthz/live
//! GET /healthz/ready
//! ```

use actix_web::{HttpResponse, get, web};
use serde::Serialize;

use crate::inbound::http::state::HttpState;

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

/// Process is up and serving requests.
#[utoipa::path(
    get,
    path = "/healthz/live",
    tag = "health",
    operation_id = "liveness",
    responses((status = 200, description = "Process is serving requests"))
)]
#[get("/healthz/live")]
pub async fn live() -> HttpResponse {
    HttpResponse::Ok().json(HealthBody { status: "ok" })
}

/// Outbound dependencies are wired and the service accepts traffic.
#[utoipa::path(
    get,
    path = "/healthz/ready",
    tag = "health",
    operation_id = "readiness",
    responses(
        (status = 200, description = "Service accepts traffic"),
        (status = 503, description = "Dependencies still starting")
    )
)]
#[get("/healthz/ready")]
pub async fn ready(state: web::Data<HttpState>) -> HttpResponse {
    if state.is_ready() {
        HttpResponse::Ok().json(HealthBody { status: "ok" })
    } else {
        HttpResponse::ServiceUnavailable().json(HealthBody {
            status: "starting",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::test_support::test_state;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn live_always_answers_ok() {
        let app = test::init_service(App::new().service(live)).await;
        let res = test::call_service(&app, test::TestRequest::get().uri("/healthz/live").to_request())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn ready_reflects_the_state_flag() {
        let (state, _store) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(ready),
        )
        .await;
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/healthz/ready").to_request())
                .await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
