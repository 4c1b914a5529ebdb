//! Position mirror types.
//!
//! Positions are owned by the ledger. This crate only holds a read-only copy,
//! replaced wholesale on snapshot load and patched per address as
//! subscription updates arrive.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CustodyAddress, PoolAddress, PositionAddress, WalletAddress};

/// Direction of a leveraged position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Profits when the mark price rises.
    Long,
    /// Profits when the mark price falls.
    Short,
}

impl Side {
    /// Whether a position on this side has crossed its liquidation threshold.
    ///
    /// A long is liquidatable once the mark price has fallen to or below its
    /// liquidation price; a short once the mark price has risen to or above it.
    #[must_use]
    pub fn is_liquidatable(self, liquidation_price: Decimal, mark_price: Decimal) -> bool {
        match self {
            Self::Long => liquidation_price >= mark_price,
            Self::Short => liquidation_price <= mark_price,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leveraged exposure record as mirrored from the ledger.
///
/// Only `custody` and `side` are interpreted by the agent. The amount fields
/// are carried as raw ledger integers for logging and for the view call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Wallet that owns the position and receives the settlement.
    pub owner: WalletAddress,
    /// Pool the position was opened against.
    pub pool: PoolAddress,
    /// Custody holding the position's collateral.
    pub custody: CustodyAddress,
    /// Long or short.
    pub side: Side,
    /// Entry price, in the ledger's fixed-point price units.
    pub price: u64,
    /// Notional size in USD units.
    pub size_usd: u64,
    /// Collateral value in USD units.
    pub collateral_usd: u64,
    /// Collateral amount in custody token units.
    pub collateral_amount: u64,
    /// Unix timestamp the position was opened.
    pub open_time: i64,
    /// Unix timestamp of the last on-ledger update.
    pub update_time: i64,
}

/// One subscription delivery for a position account.
#[derive(Debug, Clone)]
pub struct PositionUpdate {
    pub address: PositionAddress,
    pub position: Position,
    /// Ledger slot the mutation was observed at.
    pub slot: u64,
}

/// Result of a bulk position load.
#[derive(Debug, Clone, Default)]
pub struct PositionSnapshot {
    /// Cursor: no mutation at or after this slot is guaranteed to be reflected.
    pub slot: u64,
    pub positions: Vec<(PositionAddress, Position)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn long_liquidatable_when_mark_at_or_below_threshold() {
        assert!(!Side::Long.is_liquidatable(dec!(90), dec!(100)));
        assert!(Side::Long.is_liquidatable(dec!(90), dec!(90)));
        assert!(Side::Long.is_liquidatable(dec!(90), dec!(89)));
    }

    #[test]
    fn short_liquidatable_when_mark_at_or_above_threshold() {
        assert!(!Side::Short.is_liquidatable(dec!(110), dec!(100)));
        assert!(Side::Short.is_liquidatable(dec!(110), dec!(110)));
        assert!(Side::Short.is_liquidatable(dec!(110), dec!(111.5)));
    }

    #[test]
    fn side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Short).unwrap(), "\"short\"");
        assert_eq!(Side::Long.to_string(), "long");
    }
}
