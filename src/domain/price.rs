//! Oracle observations and the mark price cache.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::id::AssetId;

/// One oracle observation: aggregate price and its confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OraclePrice {
    pub price: Decimal,
    pub confidence: Decimal,
}

impl OraclePrice {
    #[must_use]
    pub const fn new(price: Decimal, confidence: Decimal) -> Self {
        Self { price, confidence }
    }

    /// Worst-case price: the observed price less its confidence interval.
    #[must_use]
    pub fn conservative(&self) -> Decimal {
        self.price - self.confidence
    }
}

/// Latest conservative price per asset.
///
/// Keyed by the custody's underlying mint, never by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkPrices {
    prices: HashMap<AssetId, Decimal>,
}

impl MarkPrices {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch of oracle observations into the cache.
    ///
    /// Returns true if at least one asset's conservative price differs from
    /// its cached value. Comparison is exact; equal values leave the entry
    /// untouched.
    pub fn apply(&mut self, observed: &HashMap<AssetId, OraclePrice>) -> bool {
        let mut changed = false;
        for (asset, observation) in observed {
            let price = observation.conservative();
            if self.prices.get(asset) == Some(&price) {
                continue;
            }
            self.prices.insert(asset.clone(), price);
            changed = true;
        }
        changed
    }

    /// Set a single asset's price directly.
    pub fn insert(&mut self, asset: AssetId, price: Decimal) {
        self.prices.insert(asset, price);
    }

    #[must_use]
    pub fn get(&self, asset: &AssetId) -> Option<Decimal> {
        self.prices.get(asset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &Decimal)> {
        self.prices.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
