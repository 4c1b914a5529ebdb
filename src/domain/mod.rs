//! Exchange-agnostic domain types for the liquidator.
//!
//! - [`id`] - Canonical address newtypes used as map keys
//! - [`position`] - Mirrored positions, subscription updates, snapshots
//! - [`custody`] - Collateral custody configuration
//! - [`price`] - Oracle observations and the mark price cache
//! - [`liquidation`] - Generation-tagged liquidation price entries

pub mod custody;
pub mod id;
pub mod liquidation;
pub mod position;
pub mod price;

pub use custody::Custody;
pub use id::{
    AssetId, CustodyAddress, OracleAccount, PoolAddress, PositionAddress, TokenAccount,
    TransactionId, WalletAddress,
};
pub use liquidation::{
    CommitResult, ComputationOutcome, EntryState, Generation, LiquidationPriceEntry,
    LiquidationTarget,
};
pub use position::{Position, PositionSnapshot, PositionUpdate, Side};
pub use price::{MarkPrices, OraclePrice};
