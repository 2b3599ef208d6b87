//! Server configuration, parsed from the environment with CLI overrides.

use std::net::SocketAddr;

use clap::Parser;
use url::Url;

use crate::domain::credential::CredentialSecret;
use crate::domain::ledger::DEFAULT_COMMISSION_PERCENT;

/// Command-line and environment configuration for the server binary.
///
/// Every flag falls back to an environment variable so container deployments
/// can configure the service without a command line.
#[derive(Debug, Parser)]
#[command(name = "roadcall", about = "Roadside assistance dispatch backend")]
pub struct Cli {
    /// Socket address to bind the HTTP listener to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Shared secret the credential signatures are derived from.
    #[arg(long, env = "CREDENTIAL_SECRET", hide_env_values = true)]
    pub credential_secret: String,

    /// Platform commission retained from each completed order, in percent.
    #[arg(long, env = "COMMISSION_PERCENT", default_value_t = DEFAULT_COMMISSION_PERCENT)]
    pub commission_percent: i64,

    /// Origins allowed to open a WebSocket, comma separated.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<Url>,
}

/// Validated server configuration.
///
/// Construction consumes the raw secret string; from here on it only exists
/// inside the zeroize-on-drop wrapper.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) database_url: String,
    pub(crate) credential_secret: CredentialSecret,
    pub(crate) commission_percent: i64,
    pub(crate) allowed_origins: Vec<Url>,
}

/// Configuration rejected before startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("commission percent must be between 0 and 100, got {0}")]
    CommissionOutOfRange(i64),
    #[error("credential secret must not be empty")]
    EmptySecret,
}

impl ServerConfig {
    /// Validate and convert parsed CLI arguments.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if !(0..=100).contains(&cli.commission_percent) {
            return Err(ConfigError::CommissionOutOfRange(cli.commission_percent));
        }
        if cli.credential_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        Ok(Self {
            bind_addr: cli.bind_addr,
            database_url: cli.database_url,
            credential_secret: CredentialSecret::new(cli.credential_secret.into_bytes()),
            commission_percent: cli.commission_percent,
            allowed_origins: cli.allowed_origins,
        })
    }

    /// Socket address the server will bind to.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cli(args: &[&str]) -> Cli {
        let base = [
            "roadcall",
            "--database-url",
            "postgres://localhost/roadcall",
            "--credential-secret",
            "test-secret",
        ];
        Cli::try_parse_from(base.iter().copied().chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[rstest]
    fn defaults_apply_without_flags() {
        let config = ServerConfig::from_cli(cli(&[])).expect("config valid");

        assert_eq!(config.bind_addr(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.commission_percent, DEFAULT_COMMISSION_PERCENT);
        assert!(config.allowed_origins.is_empty());
    }

    #[rstest]
    fn origins_split_on_commas() {
        let config = ServerConfig::from_cli(cli(&[
            "--allowed-origins",
            "https://app.example.com,https://staging.example.com",
        ]))
        .expect("config valid");

        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(
            config.allowed_origins[0].as_str(),
            "https://app.example.com/"
        );
    }

    #[rstest]
    #[case(-1)]
    #[case(101)]
    fn commission_outside_range_is_rejected(#[case] percent: i64) {
        let mut parsed = cli(&[]);
        parsed.commission_percent = percent;

        assert!(matches!(
            ServerConfig::from_cli(parsed),
            Err(ConfigError::CommissionOutOfRange(_))
        ));
    }

    #[rstest]
    fn empty_secret_is_rejected() {
        let mut parsed = cli(&[]);
        parsed.credential_secret = String::new();

        assert!(matches!(
            ServerConfig::from_cli(parsed),
            Err(ConfigError::EmptySecret)
        ));
    }
}
