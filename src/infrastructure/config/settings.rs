//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all agent settings.
//! Configuration is loaded from a TOML file; the keypair path can be
//! overridden with `LIQUIDATOR_KEYPAIR_PATH`.
//!
//! # Example
//!
//! ```no_run
//! use perp_liquidator::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::logging::LoggingConfig;
use super::network::NetworkConfig;
use super::oracle::OracleConfig;
use super::retry::RetryConfig;
use super::wallet::{WalletConfig, KEYPAIR_PATH_ENV};
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// RPC endpoints, commitment and program identity.
    pub network: NetworkConfig,

    /// Liquidator wallet.
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Oracle cluster, poll interval and asset -> price account mapping.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Bounded retry for transient ledger failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Enable dry-run mode.
    ///
    /// When true, liquidations are simulated but never submitted.
    #[serde(default)]
    pub dry_run: bool,

    /// Seconds between agent status summaries in the log.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

const fn default_status_interval_secs() -> u64 {
    60
}

fn check_pubkey(field: &'static str, value: &str) -> Result<()> {
    let decoded = bs58::decode(value)
        .into_vec()
        .map_err(|e| ConfigError::InvalidValue {
            field,
            reason: format!("'{value}' is not base58: {e}"),
        })?;
    if decoded.len() != 32 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("'{value}' decodes to {} bytes, expected 32", decoded.len()),
        }
        .into());
    }
    Ok(())
}

fn check_url(field: &'static str, value: &str) -> Result<()> {
    url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Ok(path) = std::env::var(KEYPAIR_PATH_ENV) {
            if !path.trim().is_empty() {
                config.wallet.keypair_path = Some(path);
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            return Err(ConfigError::MissingField { field: "rpc_url" }.into());
        }
        check_url("rpc_url", &self.network.rpc_url)?;
        check_url("ws_url", &self.network.ws_url())?;

        if self.network.program_id.is_empty() {
            return Err(ConfigError::MissingField {
                field: "program_id",
            }
            .into());
        }
        check_pubkey("program_id", &self.network.program_id)?;

        if self.oracle.price_accounts.is_empty() {
            return Err(ConfigError::MissingField {
                field: "price_accounts",
            }
            .into());
        }
        for (mint, account) in &self.oracle.price_accounts {
            check_pubkey("price_accounts", mint)?;
            check_pubkey("price_accounts", account)?;
        }
        if self.oracle.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            }
            .into());
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_multiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }

        if self.status_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "status_interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
