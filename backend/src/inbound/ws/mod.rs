//! WebSocket inbound adapter for the live presence channel.
//!
//! Responsibilities:
//! - validate upgrade requests (origin allow-list, signed credential)
//! - run the per-connection session loop
//! - keep WebSocket-specific concerns at the edge of the system
//!
//! Browsers cannot set custom headers on WebSocket upgrades, so the
//! credential arrives as a `credential` query parameter instead of the
//! header the REST adapter uses.

use actix_web::http::header::{HeaderValue, ORIGIN};
use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use serde::Deserialize;
use tracing::{error, warn};
use url::Url;

mod session;

pub mod messages;
pub mod registry;
pub mod state;

#[derive(Debug, Deserialize)]
struct UpgradeQuery {
    credential: Option<String>,
}

/// Handle the WebSocket upgrade for the `/ws` endpoint.
#[get("/ws")]
pub async fn ws_entry(
    state: web::Data<state::WsState>,
    req: HttpRequest,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let mut origin_iter = req.headers().get_all(ORIGIN);
    let origin_header = origin_iter.next().ok_or_else(|| {
        warn!("Missing Origin header on WebSocket upgrade");
        actix_web::error::ErrorForbidden("Origin not allowed")
    })?;
    if origin_iter.next().is_some() {
        error!("Multiple Origin headers on WebSocket upgrade");
        return Err(actix_web::error::ErrorBadRequest("Invalid Origin header"));
    }
    validate_origin(origin_header, &state.allowed_origins)?;

    let query = web::Query::<UpgradeQuery>::from_query(req.query_string())
        .map_err(|_| actix_web::error::ErrorBadRequest("Invalid query string"))?;
    let credential = query
        .into_inner()
        .credential
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("authentication failed"))?;
    let user = state
        .identity
        .authenticate(&credential)
        .await
        .map_err(|_| actix_web::error::ErrorUnauthorized("authentication failed"))?;

    let (response, session, message_stream) = actix_ws::handle(&req, stream)?;
    let state = state.get_ref().clone();
    actix_web::rt::spawn(session::handle_ws_session(
        state,
        user,
        session,
        message_stream,
    ));
    Ok(response)
}

fn validate_origin(
    origin_header: &HeaderValue,
    allowed_origins: &[Url],
) -> actix_web::Result<()> {
    let origin_value = origin_header.to_str().map_err(|error| {
        warn!(error = %error, "Failed to parse Origin header as string");
        actix_web::error::ErrorBadRequest("Invalid Origin header")
    })?;

    let origin = Url::parse(origin_value).map_err(|error| {
        warn!(error = %error, "Failed to parse Origin header as URL");
        actix_web::error::ErrorBadRequest("Invalid Origin header")
    })?;

    if is_allowed_origin(&origin, allowed_origins) {
        Ok(())
    } else {
        warn!(
            origin = origin_value,
            "Rejected WS upgrade due to disallowed Origin"
        );
        Err(actix_web::error::ErrorForbidden("Origin not allowed"))
    }
}

/// An origin matches when its scheme, host, and effective port equal a
/// configured entry. Localhost over HTTP with an explicit port is always
/// admitted for local development.
fn is_allowed_origin(origin: &Url, allowed_origins: &[Url]) -> bool {
    let Some(host) = origin.host_str() else {
        return false;
    };

    if origin.scheme() == "http"
        && host == "localhost"
        && matches!(origin.port(), Some(port) if port != 0)
    {
        return true;
    }

    allowed_origins.iter().any(|allowed| {
        allowed.scheme() == origin.scheme()
            && allowed.host_str() == origin.host_str()
            && allowed.port_or_known_default() == origin.port_or_known_default()
    })
}
