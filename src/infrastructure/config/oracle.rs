//! Oracle polling configuration.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::{AssetId, OracleAccount};

/// Oracle network the price accounts live on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OracleCluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
    Pythnet,
}

impl OracleCluster {
    /// Program that owns price accounts on this cluster.
    #[must_use]
    pub const fn program_id(self) -> &'static str {
        match self {
            Self::Devnet => "gSbePebfvPy7tRqimPoVecS2UsBvYv46ynrzWocc92s",
            Self::Testnet => "8tfDNiaEyrV6Q1U4DEXrEigs9DoDtkugzFbybENEbCDz",
            Self::MainnetBeta | Self::Pythnet => "FsJ3A3u2vn5cTVofAjvy6y5kwABJAqYWpe4975bi2epH",
        }
    }
}

/// Price feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub cluster: OracleCluster,
    /// Delay between the end of one poll and the start of the next.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Asset mint -> oracle price account.
    #[serde(default)]
    pub price_accounts: BTreeMap<String, String>,
}

const fn default_poll_interval_ms() -> u64 {
    2_000
}

impl OracleConfig {
    /// Configured price accounts as domain pairs, in mint order.
    #[must_use]
    pub fn accounts(&self) -> Vec<(AssetId, OracleAccount)> {
        self.price_accounts
            .iter()
            .map(|(mint, account)| (AssetId::from(mint.as_str()), OracleAccount::from(account.as_str())))
            .collect()
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            cluster: OracleCluster::default(),
            poll_interval_ms: default_poll_interval_ms(),
            price_accounts: BTreeMap::new(),
        }
    }
}
