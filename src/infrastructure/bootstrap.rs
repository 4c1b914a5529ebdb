//! Composition root: wires the Solana adapters into the agent.

use std::sync::Arc;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use tokio::sync::watch;
use tracing::info;

use crate::adapter::outbound::solana::account::parse_pubkey;
use crate::adapter::outbound::solana::{PythOracle, SolanaClient};
use crate::application::{Agent, AgentPorts, AgentSettings, RetryPolicy};
use crate::error::{ConfigError, ExecutionError, Result};
use crate::infrastructure::config::network::Commitment;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::wallet::WalletConfig;

#[must_use]
pub fn commitment_config(commitment: Commitment) -> CommitmentConfig {
    match commitment {
        Commitment::Processed => CommitmentConfig::processed(),
        Commitment::Confirmed => CommitmentConfig::confirmed(),
        Commitment::Finalized => CommitmentConfig::finalized(),
    }
}

/// Read the liquidator keypair named by the wallet config.
///
/// # Errors
///
/// Fails if no keypair path is configured or the file is not a keypair.
pub fn load_wallet(config: &WalletConfig) -> Result<Keypair> {
    let path = config
        .resolved_keypair_path()
        .ok_or(ConfigError::MissingField {
            field: "keypair_path",
        })?;
    read_keypair_file(&path).map_err(|e| ExecutionError::Wallet(format!("{path}: {e}")).into())
}

/// Build the agent and its adapters from configuration.
///
/// # Errors
///
/// Fails on an unreadable wallet or malformed program addresses.
pub fn build_agent(config: &Config, wallet: Keypair) -> Result<Agent> {
    let commitment = commitment_config(config.network.commitment);
    let program_id = parse_pubkey(&config.network.program_id)?;
    let oracle_program = parse_pubkey(config.oracle.cluster.program_id())?;
    let retry = RetryPolicy::new(config.retry.clone());

    let rpc = Arc::new(RpcClient::new_with_commitment(
        config.network.rpc_url.clone(),
        commitment,
    ));
    let ledger = Arc::new(SolanaClient::new(
        Arc::clone(&rpc),
        config.network.ws_url(),
        program_id,
        commitment,
        Arc::new(wallet),
        retry,
    ));
    let oracle = Arc::new(PythOracle::new(rpc, oracle_program));

    info!(
        liquidator = %ledger.liquidator(),
        program = %program_id,
        commitment = config.network.commitment.as_str(),
        "Ledger client ready"
    );

    let ports = AgentPorts {
        positions: ledger.clone(),
        custodies: ledger.clone(),
        view: ledger.clone(),
        oracle,
        submitter: ledger,
    };
    Ok(Agent::new(ports, AgentSettings::from_config(config)))
}

/// Run the agent until `shutdown` fires.
///
/// # Errors
///
/// Returns wiring and startup failures.
pub async fn run(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let wallet = load_wallet(&config.wallet)?;
    info!(wallet = %wallet.pubkey(), "Wallet loaded");
    let agent = build_agent(&config, wallet)?;
    agent.run(shutdown).await?;
    info!("Agent stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use solana_sdk::signature::write_keypair_file;

    const PROGRAM: &str = "H1byJyMjQ3gUrtrrav5FV7yV3Jo6pT8YePtNkdGgoa1P";
    const SOL_MINT: &str = "EtX1Uagb44Yp5p4hsqjwAwF3mKaQTMizCyvC1CsyHAQN";
    const SOL_PRICE: &str = "J83w4HKfqxwcq3BEMMkPFSppX3gqekLyLJBexebFVkix";

    fn config() -> Config {
        Config::parse_toml(&format!(
            r#"
[network]
rpc_url = "http://127.0.0.1:8899"
program_id = "{PROGRAM}"

[oracle.price_accounts]
"{SOL_MINT}" = "{SOL_PRICE}"
"#
        ))
        .unwrap()
    }

    #[test]
    fn maps_commitment_levels() {
        assert_eq!(
            commitment_config(Commitment::Processed),
            CommitmentConfig::processed()
        );
        assert_eq!(
            commitment_config(Commitment::Confirmed),
            CommitmentConfig::confirmed()
        );
        assert_eq!(
            commitment_config(Commitment::Finalized),
            CommitmentConfig::finalized()
        );
    }

    #[test]
    fn wallet_requires_a_path() {
        let result = load_wallet(&WalletConfig::default());
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingField {
                field: "keypair_path"
            }))
        ));
    }

    #[test]
    fn wallet_rejects_garbage_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "not a keypair").unwrap();
        let wallet = WalletConfig {
            keypair_path: Some(file.path().display().to_string()),
        };

        let result = load_wallet(&wallet);

        assert!(matches!(result, Err(Error::Execution(ExecutionError::Wallet(_)))));
    }

    #[test]
    fn wallet_loads_keypair_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liquidator.json");
        let keypair = Keypair::new();
        write_keypair_file(&keypair, &path).unwrap();
        let wallet = WalletConfig {
            keypair_path: Some(path.display().to_string()),
        };

        let loaded = load_wallet(&wallet).unwrap();

        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[tokio::test]
    async fn builds_agent_without_touching_the_network() {
        let agent = build_agent(&config(), Keypair::new()).unwrap();
        assert!(agent.positions().is_empty());
        assert!(!agent.executor().is_dry_run());
    }
}
