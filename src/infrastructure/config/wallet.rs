//! Wallet configuration for signing liquidations.

use serde::Deserialize;

/// Environment variable that overrides the configured keypair path.
pub const KEYPAIR_PATH_ENV: &str = "LIQUIDATOR_KEYPAIR_PATH";

/// Wallet configuration.
/// The keypair file is read at startup; its contents never pass through the config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Path to a JSON keypair file.
    #[serde(default)]
    pub keypair_path: Option<String>,
}

impl WalletConfig {
    /// Keypair path with `~/` expanded against `HOME`.
    #[must_use]
    pub fn resolved_keypair_path(&self) -> Option<String> {
        let path = self.keypair_path.as_ref()?;
        match (path.strip_prefix("~/"), std::env::var("HOME")) {
            (Some(rest), Ok(home)) => Some(format!("{home}/{rest}")),
            _ => Some(path.clone()),
        }
    }
}
