//! Handler for the `run` command.

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Execute the run command until Ctrl-C.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    apply_overrides(&mut config, args);
    if output::is_json() {
        config.logging.format = "json".into();
    }
    config.init_logging();

    if !output::is_quiet() || output::is_json() {
        print_startup_config(&config);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                shutdown_tx.closed().await;
            }
        }
    });

    launch(config, shutdown_rx).await
}

#[cfg(feature = "solana")]
async fn launch(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    crate::infrastructure::bootstrap::run(config, shutdown).await
}

#[cfg(not(feature = "solana"))]
async fn launch(_config: Config, _shutdown: watch::Receiver<bool>) -> Result<()> {
    Err(crate::error::ConfigError::InvalidValue {
        field: "network",
        reason: "built without the `solana` feature".to_string(),
    }
    .into())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".into();
    }
    if let Some(keypair) = &args.keypair {
        config.wallet.keypair_path = Some(keypair.clone());
    }
}

fn print_startup_config(config: &Config) {
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("RPC", &config.network.rpc_url);
    output::field("Program", &config.network.program_id);
    output::field("Commitment", config.network.commitment.as_str());
    output::field("Price accounts", config.oracle.price_accounts.len());

    if config.dry_run {
        output::warning("Dry-run mode enabled - liquidations will be simulated only");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("config.toml"),
            log_level: None,
            dry_run: false,
            json_logs: false,
            keypair: None,
        }
    }

    #[test]
    fn no_flags_leave_config_untouched() {
        let mut config = Config::default();
        apply_overrides(&mut config, &args());

        assert!(!config.dry_run);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.wallet.keypair_path.is_none());
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        let args = RunArgs {
            log_level: Some("debug".into()),
            dry_run: true,
            json_logs: true,
            keypair: Some("/keys/liquidator.json".into()),
            ..args()
        };

        apply_overrides(&mut config, &args);

        assert!(config.dry_run);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(
            config.wallet.keypair_path.as_deref(),
            Some("/keys/liquidator.json")
        );
    }

    #[test]
    fn dry_run_flag_cannot_disable_configured_dry_run() {
        let mut config = Config {
            dry_run: true,
            ..Default::default()
        };
        apply_overrides(&mut config, &args());
        assert!(config.dry_run);
    }
}
