//! Builders for domain primitives used across tests.
//!
//! Addresses in tests are short readable labels (`"pos-1"`, `"sol"`) rather
//! than base58 keys; nothing in the application layer interprets them.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::{
    AssetId, Custody, CustodyAddress, OracleAccount, OraclePrice, PoolAddress, Position,
    PositionAddress, PositionUpdate, Side, TokenAccount, WalletAddress,
};

/// Create a [`PositionAddress`] from a label.
pub fn position_address(id: &str) -> PositionAddress {
    PositionAddress::from(id)
}

/// Create a [`CustodyAddress`] from a label.
pub fn custody_address(id: &str) -> CustodyAddress {
    CustodyAddress::from(id)
}

/// Create an [`AssetId`] from a label.
pub fn asset(id: &str) -> AssetId {
    AssetId::from(id)
}

/// A custody holding `mint`, priced by `{mint}-oracle`.
pub fn custody(mint: &str) -> Custody {
    Custody {
        pool: PoolAddress::from("pool"),
        mint: AssetId::from(mint),
        token_account: TokenAccount::from(format!("{mint}-vault")),
        decimals: 9,
        oracle_account: OracleAccount::from(format!("{mint}-oracle")),
    }
}

/// A position against `custody` on `side` with round default amounts.
pub fn position(custody: &str, side: Side) -> Position {
    Position {
        owner: WalletAddress::from("owner"),
        pool: PoolAddress::from("pool"),
        custody: CustodyAddress::from(custody),
        side,
        price: 100_000_000,
        size_usd: 1_000_000_000,
        collateral_usd: 100_000_000,
        collateral_amount: 1_000_000_000,
        open_time: 1_700_000_000,
        update_time: 1_700_000_000,
    }
}

/// A long position against `custody`.
pub fn long(custody: &str) -> Position {
    position(custody, Side::Long)
}

/// A short position against `custody`.
pub fn short(custody: &str) -> Position {
    position(custody, Side::Short)
}

/// A subscription delivery for `address` at `slot`.
pub fn update(address: &str, position: Position, slot: u64) -> PositionUpdate {
    PositionUpdate {
        address: PositionAddress::from(address),
        position,
        slot,
    }
}

/// A poll result from `(asset, price, confidence)` triples.
pub fn observed(entries: &[(&str, Decimal, Decimal)]) -> HashMap<AssetId, OraclePrice> {
    entries
        .iter()
        .map(|(id, price, confidence)| (AssetId::from(*id), OraclePrice::new(*price, *confidence)))
        .collect()
}
