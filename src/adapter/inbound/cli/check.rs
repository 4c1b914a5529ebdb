//! Handler for `check config`.

use std::path::Path;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Summary of a validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCheckReport {
    pub rpc_url: String,
    pub ws_url: String,
    pub commitment: &'static str,
    pub program_id: String,
    pub oracle_program: &'static str,
    pub price_accounts: usize,
    pub keypair_path: Option<String>,
    pub keypair_present: bool,
    pub dry_run: bool,
}

impl ConfigCheckReport {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let keypair_path = config.wallet.resolved_keypair_path();
        let keypair_present = keypair_path
            .as_deref()
            .is_some_and(|path| Path::new(path).is_file());
        Self {
            rpc_url: config.network.rpc_url.clone(),
            ws_url: config.network.ws_url(),
            commitment: config.network.commitment.as_str(),
            program_id: config.network.program_id.clone(),
            oracle_program: config.oracle.cluster.program_id(),
            price_accounts: config.oracle.price_accounts.len(),
            keypair_path,
            keypair_present,
            dry_run: config.dry_run,
        }
    }
}

/// Validate the configuration file without starting the agent.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;
    let report = ConfigCheckReport::from_config(&config);

    output::section("Configuration Check");
    output::field("Config", path.display());
    output::success("Configuration file is valid");

    output::section("Summary");
    output::field("RPC", &report.rpc_url);
    output::field("Websocket", &report.ws_url);
    output::field("Commitment", report.commitment);
    output::field("Program", &report.program_id);
    output::field("Oracle program", report.oracle_program);
    output::field("Price accounts", report.price_accounts);
    output::field("Dry run", report.dry_run);

    match (&report.keypair_path, report.keypair_present) {
        (Some(path), true) => output::field("Keypair", path),
        (Some(path), false) => output::warning(&format!("Keypair file not found: {path}")),
        (None, _) => output::warning("No keypair configured (set LIQUIDATOR_KEYPAIR_PATH)"),
    }

    output::success("Configuration check complete");
    Ok(())
}
