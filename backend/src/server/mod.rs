//! Server bootstrap: pool construction, schema migration, dependency
//! wiring, and the actix `HttpServer` loop.

mod config;

pub use config::{Cli, ConfigError, ServerConfig};

use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use diesel::Connection as _;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;
#[cfg(debug_assertions)]
use utoipa::OpenApi as _;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::domain::{
    BonusService, DispatchService, IdentityService, PresenceService, SettlementService,
};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{configure_api, health};
use crate::inbound::ws;
use crate::inbound::ws::state::WsState;
use crate::middleware::Trace;
use crate::outbound::persistence::{
    DbPool, DieselLedgerRepository, DieselOrderRepository, DieselPaymentRepository,
    DieselPositionRepository, DieselPromoRepository, DieselReferralRepository,
    DieselUserRepository, PoolConfig,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Apply pending migrations over a dedicated blocking connection.
///
/// Migrations run once at startup before the pool serves traffic, so a
/// plain synchronous connection keeps the harness simple.
async fn run_migrations(database_url: String) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&database_url)
            .map_err(|err| io::Error::other(format!("database connection failed: {err}")))?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| io::Error::other(format!("migration failed: {err}")))?;
        info!(count = applied.len(), "migrations applied");
        Ok(())
    })
    .await
    .map_err(|err| io::Error::other(format!("migration task panicked: {err}")))?
}

/// Wire the Diesel adapters into the domain services and adapter states.
fn build_states(pool: DbPool, config: &ServerConfig) -> (HttpState, WsState) {
    let users = Arc::new(DieselUserRepository::new(pool.clone()));
    let orders = Arc::new(DieselOrderRepository::new(pool.clone()));
    let promos = Arc::new(DieselPromoRepository::new(pool.clone()));
    let referrals = Arc::new(DieselReferralRepository::new(pool.clone()));
    let payments = Arc::new(DieselPaymentRepository::new(pool.clone()));
    let positions = Arc::new(DieselPositionRepository::new(pool.clone()));
    let ledger = Arc::new(DieselLedgerRepository::new(pool));

    let identity = Arc::new(IdentityService::new(
        config.credential_secret.clone(),
        users.clone(),
    ));
    let dispatch = Arc::new(DispatchService::new(
        orders.clone(),
        config.commission_percent,
    ));
    let bonuses = Arc::new(BonusService::new(users, promos, referrals));
    let settlement = Arc::new(SettlementService::new(payments.clone()));
    let presence = Arc::new(PresenceService::new(positions, orders));

    let http_state = HttpState::new(identity.clone(), dispatch, bonuses, settlement, payments, ledger);
    let ws_state = WsState::new(identity, presence, config.allowed_origins.clone());
    (http_state, ws_state)
}

/// Run the server until the listener shuts down.
pub async fn run(config: ServerConfig) -> io::Result<()> {
    run_migrations(config.database_url.clone()).await?;

    let pool = DbPool::new(PoolConfig::new(&config.database_url))
        .await
        .map_err(io::Error::other)?;

    let bind_addr = config.bind_addr();
    let (http_state, ws_state) = build_states(pool, &config);

    let server_http_state = http_state.clone();
    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(server_http_state.clone()))
            .app_data(web::Data::new(ws_state.clone()))
            .wrap(Trace)
            .configure(configure_api)
            .service(ws::ws_entry)
            .service(health::live)
            .service(health::ready);

        #[cfg(feature = "metrics")]
        let app = app.wrap(actix_web::middleware::Condition::from_option(
            make_metrics(),
        ));

        #[cfg(debug_assertions)]
        let app =
            app.service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()));

        app
    })
    .bind(bind_addr)?;

    info!(%bind_addr, "listener bound");
    http_state.mark_ready();
    server.run().await
}

/// Build the Prometheus middleware, or run without it if the registry
/// cannot be configured.
#[cfg(feature = "metrics")]
fn make_metrics() -> Option<actix_web_prom::PrometheusMetrics> {
    use actix_web_prom::PrometheusMetricsBuilder;

    match PrometheusMetricsBuilder::new("roadcall")
        .endpoint("/metrics")
        .build()
    {
        Ok(metrics) => Some(metrics),
        Err(error) => {
            tracing::error!(error = %error, "failed to configure Prometheus metrics");
            None
        }
    }
}
