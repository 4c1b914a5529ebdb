//! Ledger network configuration.

use serde::Deserialize;

/// Commitment level used for reads and subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Fastest; may observe state that is later rolled back.
    #[default]
    Processed,
    /// Voted on by a supermajority.
    Confirmed,
    /// Rooted.
    Finalized,
}

impl Commitment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

/// RPC endpoints and the target program.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// HTTP JSON-RPC endpoint.
    pub rpc_url: String,
    /// WebSocket endpoint for subscriptions. Derived from `rpc_url` when absent.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Commitment for reads and subscriptions.
    #[serde(default)]
    pub commitment: Commitment,
    /// Perpetuals program identity (base58).
    pub program_id: String,
}

impl NetworkConfig {
    /// The subscription endpoint, deriving `ws(s)://` from the RPC URL if needed.
    #[must_use]
    pub fn ws_url(&self) -> String {
        if let Some(ws) = &self.ws_url {
            return ws.clone();
        }
        if let Some(rest) = self.rpc_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.rpc_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.rpc_url.clone()
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".into(),
            ws_url: None,
            commitment: Commitment::Processed,
            program_id: String::new(),
        }
    }
}
