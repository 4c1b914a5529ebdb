//! Liquidation price cache keyed by position address.
//!
//! Owned by the decision engine and mutated from a single task, so no lock.
//! Entries of closed positions are removed; an address tracked again later
//! continues numbering after every generation ever issued, so a result still
//! in flight from before the removal is discarded.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{
    CommitResult, ComputationOutcome, EntryState, Generation, LiquidationPriceEntry, Position,
    PositionAddress,
};

/// Entry counts by state, for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub pending: usize,
    pub fresh: usize,
    pub failed: usize,
}

/// Per-position liquidation prices with generation-tagged commits.
#[derive(Debug, Default)]
pub struct LiquidationPriceCache {
    entries: HashMap<PositionAddress, LiquidationPriceEntry>,
    highest_issued: Generation,
}

impl LiquidationPriceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new computation for `address` in state `position`,
    /// superseding any in flight.
    pub fn issue(&mut self, address: &PositionAddress, position: &Position) -> Generation {
        let highest = self.highest_issued;
        let generation = self
            .entries
            .entry(address.clone())
            .or_insert_with(|| LiquidationPriceEntry::starting_after(highest))
            .issue(position.clone());
        self.highest_issued = self.highest_issued.max(generation);
        generation
    }

    /// Commit an outcome issued under `generation`.
    ///
    /// Superseded outcomes leave the entry untouched.
    pub fn commit(
        &mut self,
        address: &PositionAddress,
        generation: Generation,
        outcome: &ComputationOutcome,
    ) -> CommitResult {
        let result = match self.entries.get_mut(address) {
            Some(entry) => entry.commit(generation, outcome),
            None => CommitResult::Superseded,
        };
        if result == CommitResult::Superseded {
            debug!(
                position = %address,
                generation = %generation,
                current = ?self.entries.get(address).and_then(LiquidationPriceEntry::in_flight),
                "discarding superseded liquidation price"
            );
        }
        result
    }

    #[must_use]
    pub fn state(&self, address: &PositionAddress) -> EntryState {
        self.entries
            .get(address)
            .map_or(EntryState::Uncomputed, LiquidationPriceEntry::state)
    }

    /// Liquidation price for `address`, only while its entry is fresh.
    #[must_use]
    pub fn fresh_price(&self, address: &PositionAddress) -> Option<Decimal> {
        self.entries
            .get(address)
            .and_then(LiquidationPriceEntry::fresh_price)
    }

    /// Fresh liquidation price for `address`, only if it was computed for
    /// exactly `position`.
    #[must_use]
    pub fn fresh_price_for(
        &self,
        address: &PositionAddress,
        position: &Position,
    ) -> Option<Decimal> {
        self.entries
            .get(address)
            .and_then(|entry| entry.fresh_price_for(position))
    }

    #[must_use]
    pub fn get(&self, address: &PositionAddress) -> Option<&LiquidationPriceEntry> {
        self.entries.get(address)
    }

    /// Stop tracking `address`. Outcomes still in flight for it are discarded.
    pub fn remove(&mut self, address: &PositionAddress) -> Option<LiquidationPriceEntry> {
        self.entries.remove(address)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.entries.values() {
            match entry.state() {
                EntryState::Pending => stats.pending += 1,
                EntryState::Fresh => stats.fresh += 1,
                EntryState::Failed => stats.failed += 1,
                EntryState::Uncomputed => {}
            }
        }
        stats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
