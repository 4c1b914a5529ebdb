//! Liquidation port: simulate and submit the liquidate instruction.

use async_trait::async_trait;

use crate::domain::{LiquidationTarget, TransactionId};
use crate::error::Error;

/// Submits liquidation transactions for a flagged position.
///
/// Implementations derive the owner's settlement account and the liquidator's
/// reward account, and assemble the instruction's account set.
#[async_trait]
pub trait LiquidationSubmitter: Send + Sync {
    /// Dry-run the liquidation. `Err` means the ledger would reject it.
    async fn simulate_liquidation(&self, target: &LiquidationTarget) -> Result<(), Error>;

    /// Sign, send and confirm the liquidation.
    async fn submit_liquidation(&self, target: &LiquidationTarget) -> Result<TransactionId, Error>;
}
