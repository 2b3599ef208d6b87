//! Order HTTP handlers.
//!
//! ```text
//! POST /api/v1/orders
//! GET  /api/v1/orders/open
//! GET  /api/v1/orders/{id}
//! POST /api/v1/orders/{id}/accept
//! POST /api/v1/orders/{id}/complete
//! POST /api/v1/orders/{id}/cancel
//! ```

use std::str::FromStr;

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::domain::Error;
use crate::domain::order::{GeoPoint, OrderId, ServiceCategory, ServiceOrder};
use crate::domain::ports::CreateOrderRequest;
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::AuthenticatedUser;
use crate::inbound::http::state::HttpState;

/// Request payload for creating an order.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    /// Service category, e.g. `towing` or `fuel_delivery`.
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    /// Agreed price in RUB minor units.
    pub price_kopecks: i64,
}

/// Advisory arrival window payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalEstimateBody {
    pub from_minutes: i16,
    pub to_minutes: i16,
}

/// Order representation returned by every order endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub code: String,
    #[schema(format = "uuid")]
    pub customer_id: String,
    #[schema(format = "uuid")]
    pub driver_id: Option<String>,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub price_kopecks: i64,
    pub status: String,
    pub arrival_estimate: Option<ArrivalEstimateBody>,
    #[schema(format = "date-time")]
    pub created_at: String,
}

impl From<ServiceOrder> for OrderBody {
    fn from(order: ServiceOrder) -> Self {
        Self {
            id: order.id.to_string(),
            code: order.code,
            customer_id: order.customer_id.to_string(),
            driver_id: order.driver_id.map(|id| id.to_string()),
            category: order.category.to_string(),
            latitude: order.location.latitude,
            longitude: order.location.longitude,
            description: order.description,
            price_kopecks: order.price_kopecks,
            status: order.status.to_string(),
            arrival_estimate: order.arrival_estimate.map(|estimate| ArrivalEstimateBody {
                from_minutes: estimate.from_minutes,
                to_minutes: estimate.to_minutes,
            }),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

fn parse_category(raw: &str) -> Result<ServiceCategory, Error> {
    ServiceCategory::from_str(raw).map_err(|_| {
        Error::invalid_request("unknown service category").with_details(json!({
            "field": "category",
            "value": raw,
            "code": "invalid_category",
        }))
    })
}

fn parse_order_id(raw: &str) -> Result<OrderId, Error> {
    OrderId::from_str(raw).map_err(|_| {
        Error::invalid_request("order id must be a UUID").with_details(json!({
            "field": "id",
            "value": raw,
            "code": "invalid_uuid",
        }))
    })
}

/// Create an order searching for a driver.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderBody,
    responses(
        (status = 201, description = "Order created", body = OrderBody),
        (status = 400, description = "Invalid request", body = crate::domain::Error),
        (status = 401, description = "Unauthorized", body = crate::domain::Error)
    ),
    tags = ["orders"],
    operation_id = "createOrder",
    security(("CredentialHeader" = []))
)]
#[post("/orders")]
pub async fn create_order(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    payload: web::Json<CreateOrderBody>,
) -> ApiResult<(web::Json<OrderBody>, actix_web::http::StatusCode)> {
    let payload = payload.into_inner();
    let request = CreateOrderRequest {
        category: parse_category(&payload.category)?,
        location: GeoPoint::new(payload.latitude, payload.longitude)
            .map_err(|err| Error::invalid_request(err.to_string()))?,
        description: payload.description,
        price_kopecks: payload.price_kopecks,
    };

    let order = state.dispatch.create(&caller.0, request).await?;
    Ok((
        web::Json(order.into()),
        actix_web::http::StatusCode::CREATED,
    ))
}

/// Query parameters for the open-order listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct OpenOrdersQuery {
    /// Service category to list.
    pub category: String,
}

/// List searching orders in a category the calling driver serves.
#[utoipa::path(
    get,
    path = "/api/v1/orders/open",
    params(OpenOrdersQuery),
    responses(
        (status = 200, description = "Open orders, oldest first", body = [OrderBody]),
        (status = 401, description = "Unauthorized", body = crate::domain::Error),
        (status = 403, description = "Not a driver for this category", body = crate::domain::Error)
    ),
    tags = ["orders"],
    operation_id = "listOpenOrders",
    security(("CredentialHeader" = []))
)]
#[get("/orders/open")]
pub async fn list_open_orders(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    query: web::Query<OpenOrdersQuery>,
) -> ApiResult<web::Json<Vec<OrderBody>>> {
    let category = parse_category(&query.category)?;
    let orders = state.dispatch.list_open(&caller.0, category).await?;
    Ok(web::Json(orders.into_iter().map(OrderBody::from).collect()))
}

/// Fetch one order the caller is a party to.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = uuid::Uuid, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "The order", body = OrderBody),
        (status = 403, description = "Not a party to this order", body = crate::domain::Error),
        (status = 404, description = "Order not found", body = crate::domain::Error)
    ),
    tags = ["orders"],
    operation_id = "getOrder",
    security(("CredentialHeader" = []))
)]
#[get("/orders/{id}")]
pub async fn get_order(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<OrderBody>> {
    let order_id = parse_order_id(&path.into_inner())?;
    let order = state.dispatch.get(&caller.0, order_id).await?;
    Ok(web::Json(order.into()))
}

/// Accept a searching order as the calling driver.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/accept",
    params(("id" = uuid::Uuid, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order accepted by the caller", body = OrderBody),
        (status = 403, description = "Not a driver for this category", body = crate::domain::Error),
        (status = 404, description = "Order not found", body = crate::domain::Error),
        (status = 409, description = "Order is no longer available", body = crate::domain::Error)
    ),
    tags = ["orders"],
    operation_id = "acceptOrder",
    security(("CredentialHeader" = []))
)]
#[post("/orders/{id}/accept")]
pub async fn accept_order(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<OrderBody>> {
    let order_id = parse_order_id(&path.into_inner())?;
    let order = state.dispatch.accept(&caller.0, order_id).await?;
    Ok(web::Json(order.into()))
}

/// Complete an accepted order, settling the driver's share.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/complete",
    params(("id" = uuid::Uuid, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order completed and settled", body = OrderBody),
        (status = 403, description = "Caller is not the bound driver", body = crate::domain::Error),
        (status = 404, description = "Order not found", body = crate::domain::Error),
        (status = 409, description = "Order is not completable", body = crate::domain::Error)
    ),
    tags = ["orders"],
    operation_id = "completeOrder",
    security(("CredentialHeader" = []))
)]
#[post("/orders/{id}/complete")]
pub async fn complete_order(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<OrderBody>> {
    let order_id = parse_order_id(&path.into_inner())?;
    let order = state.dispatch.complete(&caller.0, order_id).await?;
    Ok(web::Json(order.into()))
}

/// Cancel a non-terminal order as either party.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = uuid::Uuid, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order cancelled", body = OrderBody),
        (status = 403, description = "Not a party to this order", body = crate::domain::Error),
        (status = 404, description = "Order not found", body = crate::domain::Error),
        (status = 409, description = "Order already finished", body = crate::domain::Error)
    ),
    tags = ["orders"],
    operation_id = "cancelOrder",
    security(("CredentialHeader" = []))
)]
#[post("/orders/{id}/cancel")]
pub async fn cancel_order(
    state: web::Data<HttpState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> ApiResult<web::Json<OrderBody>> {
    let order_id = parse_order_id(&path.into_inner())?;
    let order = state.dispatch.cancel(&caller.0, order_id).await?;
    Ok(web::Json(order.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::auth::CREDENTIAL_HEADER;
    use crate::inbound::http::test_support::{TestUser, customer, test_state, towing_driver};
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
                .service(create_order)
                .service(list_open_orders)
                .service(get_order)
                .service(accept_order)
                .service(complete_order)
                .service(cancel_order),
        )
    }

    fn towing_body() -> CreateOrderBody {
        CreateOrderBody {
            category: "towing".to_owned(),
            latitude: 55.75,
            longitude: 37.61,
            description: "won't start".to_owned(),
            price_kopecks: 1500_00,
        }
    }

    async fn create_via(
        app: &impl actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
        creator: &TestUser,
    ) -> OrderBody {
        let req = test::TestRequest::post()
            .uri("/api/v1/orders")
            .insert_header((CREDENTIAL_HEADER, creator.credential.as_str()))
            .set_json(towing_body())
            .to_request();
        let res = test::call_service(app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        test::read_body_json(res).await
    }

    #[actix_web::test]
    async fn create_then_accept_then_complete_settles_the_driver() {
        let (state, store) = test_state();
        let customer = customer(&store, 1);
        let driver = towing_driver(&store, 2);
        let app = test::init_service(app_with(state)).await;

        let order = create_via(&app, &customer).await;
        assert_eq!(order.status, "searching");

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/orders/{}/accept", order.id))
            .insert_header((CREDENTIAL_HEADER, driver.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let accepted: OrderBody = test::read_body_json(res).await;
        assert_eq!(accepted.status, "accepted");
        assert!(accepted.arrival_estimate.is_some());

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/orders/{}/complete", order.id))
            .insert_header((CREDENTIAL_HEADER, driver.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let account = store.user(&driver.user.id).expect("driver exists");
        assert_eq!(account.balance_kopecks, 1350_00);
    }

    #[actix_web::test]
    async fn losing_driver_receives_a_conflict() {
        let (state, store) = test_state();
        let customer = customer(&store, 1);
        let winner = towing_driver(&store, 2);
        let loser = towing_driver(&store, 3);
        let app = test::init_service(app_with(state)).await;

        let order = create_via(&app, &customer).await;
        let accept = |credential: String| {
            test::TestRequest::post()
                .uri(&format!("/api/v1/orders/{}/accept", order.id))
                .insert_header((CREDENTIAL_HEADER, credential))
                .to_request()
        };

        let res = test::call_service(&app, accept(winner.credential.clone())).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = test::call_service(&app, accept(loser.credential.clone())).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["code"], "conflict");
    }

    #[actix_web::test]
    async fn unknown_category_is_a_bad_request() {
        let (state, store) = test_state();
        let customer = customer(&store, 1);
        let app = test::init_service(app_with(state)).await;

        let mut body = towing_body();
        body.category = "helicopter".to_owned();
        let req = test::TestRequest::post()
            .uri("/api/v1/orders")
            .insert_header((CREDENTIAL_HEADER, customer.credential.as_str()))
            .set_json(body)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["details"]["code"], "invalid_category");
    }

    #[actix_web::test]
    async fn open_listing_filters_by_category_and_requires_a_driver() {
        let (state, store) = test_state();
        let customer = customer(&store, 1);
        let driver = towing_driver(&store, 2);
        let app = test::init_service(app_with(state)).await;

        create_via(&app, &customer).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/orders/open?category=towing")
            .insert_header((CREDENTIAL_HEADER, driver.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let open: Vec<OrderBody> = test::read_body_json(res).await;
        assert_eq!(open.len(), 1);

        let req = test::TestRequest::get()
            .uri("/api/v1/orders/open?category=towing")
            .insert_header((CREDENTIAL_HEADER, customer.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn stranger_cannot_fetch_an_order() {
        let (state, store) = test_state();
        let owner = customer(&store, 1);
        let stranger = customer(&store, 4);
        let app = test::init_service(app_with(state)).await;

        let order = create_via(&app, &owner).await;
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/orders/{}", order.id))
            .insert_header((CREDENTIAL_HEADER, stranger.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn malformed_order_id_is_a_bad_request() {
        let (state, store) = test_state();
        let customer = customer(&store, 1);
        let app = test::init_service(app_with(state)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/orders/not-a-uuid")
            .insert_header((CREDENTIAL_HEADER, customer.credential.as_str()))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
