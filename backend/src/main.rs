//! Backend entry-point: configuration parsing and server bootstrap.

use clap::Parser as _;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use roadcall::server::{Cli, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = ServerConfig::from_cli(Cli::parse()).map_err(std::io::Error::other)?;
    roadcall::server::run(config).await
}
