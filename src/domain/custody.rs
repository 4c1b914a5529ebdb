//! Collateral custody configuration.

use super::id::{AssetId, OracleAccount, PoolAddress, TokenAccount};

/// Configuration for one collateral asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Custody {
    /// Pool this custody belongs to.
    pub pool: PoolAddress,
    /// Mint of the held asset; keys the mark price cache.
    pub mint: AssetId,
    /// Token account holding the pooled asset.
    pub token_account: TokenAccount,
    /// Decimal precision of the mint.
    pub decimals: u8,
    /// Oracle account the ledger prices this asset with.
    pub oracle_account: OracleAccount,
}
