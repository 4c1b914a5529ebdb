//! Liquidate-or-not decisions.
//!
//! The engine owns the liquidation price cache. A position is flagged only
//! when all three inputs are present: a fresh liquidation price computed for
//! the position state being evaluated, a cached custody, and a mark price for
//! that custody's mint. Anything missing skips the position for this round; it
//! is looked at again on the next trigger.

use rust_decimal::Decimal;
use tracing::{info, trace};

use super::cache::{CacheStats, CustodyCache, LiquidationPriceCache};
use crate::domain::{
    CommitResult, ComputationOutcome, EntryState, Generation, LiquidationTarget, MarkPrices,
    Position, PositionAddress,
};

/// Decides which positions are eligible for liquidation.
#[derive(Debug, Default)]
pub struct DecisionEngine {
    cache: LiquidationPriceCache,
}

impl DecisionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a liquidation price computation for `address` in state `position`.
    pub fn issue(&mut self, address: &PositionAddress, position: &Position) -> Generation {
        self.cache.issue(address, position)
    }

    /// Forget a closed position.
    pub fn remove(&mut self, address: &PositionAddress) {
        self.cache.remove(address);
    }

    /// Commit a computation outcome.
    pub fn commit(
        &mut self,
        address: &PositionAddress,
        generation: Generation,
        outcome: &ComputationOutcome,
    ) -> CommitResult {
        self.cache.commit(address, generation, outcome)
    }

    #[must_use]
    pub fn state(&self, address: &PositionAddress) -> EntryState {
        self.cache.state(address)
    }

    #[must_use]
    pub fn liquidation_price(&self, address: &PositionAddress) -> Option<Decimal> {
        self.cache.fresh_price(address)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Evaluate one position against the current mark prices.
    #[must_use]
    pub fn evaluate(
        &self,
        address: &PositionAddress,
        position: &Position,
        custodies: &CustodyCache,
        marks: &MarkPrices,
    ) -> Option<LiquidationTarget> {
        let Some(liquidation_price) = self.cache.fresh_price_for(address, position) else {
            trace!(position = %address, state = ?self.cache.state(address), "No fresh liquidation price");
            return None;
        };
        let Some(custody) = custodies.get(&position.custody) else {
            trace!(position = %address, custody = %position.custody, "Custody not cached");
            return None;
        };
        let Some(mark_price) = marks.get(&custody.mint) else {
            trace!(position = %address, mint = %custody.mint, "No mark price");
            return None;
        };

        if !position.side.is_liquidatable(liquidation_price, mark_price) {
            return None;
        }

        info!(
            position = %address,
            side = %position.side,
            liquidation_price = %liquidation_price,
            mark_price = %mark_price,
            "Position eligible for liquidation"
        );
        Some(LiquidationTarget {
            address: address.clone(),
            position: position.clone(),
            custody,
        })
    }

    /// Evaluate every position, returning the eligible ones.
    #[must_use]
    pub fn evaluate_all<'a, I>(
        &self,
        positions: I,
        custodies: &CustodyCache,
        marks: &MarkPrices,
    ) -> Vec<LiquidationTarget>
    where
        I: IntoIterator<Item = (&'a PositionAddress, &'a Position)>,
    {
        positions
            .into_iter()
            .filter_map(|(address, position)| self.evaluate(address, position, custodies, marks))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{asset, custody, custody_address, long, position_address, short};
    use rust_decimal_macros::dec;

    fn custodies() -> CustodyCache {
        CustodyCache::from_entries(vec![(custody_address("c-sol"), custody("sol"))])
    }

    fn marks(price: Decimal) -> MarkPrices {
        let mut marks = MarkPrices::new();
        marks.insert(asset("sol"), price);
        marks
    }

    fn engine_with_price(address: &PositionAddress, price: Decimal) -> DecisionEngine {
        let mut engine = DecisionEngine::new();
        let generation = engine.issue(address, &long("c-sol"));
        engine.commit(address, generation, &ComputationOutcome::Computed(price));
        engine
    }

    #[test]
    fn long_triggers_once_as_mark_falls_through_threshold() {
        let p = position_address("p");
        let position = long("c-sol");
        let engine = engine_with_price(&p, dec!(90));
        let custodies = custodies();

        let flagged: Vec<usize> = [dec!(100), dec!(95), dec!(89)]
            .into_iter()
            .map(|mark| {
                engine
                    .evaluate_all([(&p, &position)], &custodies, &marks(mark))
                    .len()
            })
            .collect();

        assert_eq!(flagged, vec![0, 0, 1]);
    }

    #[test]
    fn short_triggers_at_or_above_threshold() {
        let p = position_address("p");
        let position = short("c-sol");
        let engine = engine_with_price(&p, dec!(110));
        let custodies = custodies();

        assert!(engine.evaluate(&p, &position, &custodies, &marks(dec!(109.99))).is_none());
        let target = engine
            .evaluate(&p, &position, &custodies, &marks(dec!(110)))
            .unwrap();
        assert_eq!(target.address, p);
        assert_eq!(target.custody, custody("sol"));
    }

    #[test]
    fn pending_or_failed_price_is_never_flagged() {
        let p = position_address("p");
        let position = long("c-sol");
        let mut engine = engine_with_price(&p, dec!(90));
        let custodies = custodies();

        engine.issue(&p, &position);
        assert!(engine.evaluate(&p, &position, &custodies, &marks(dec!(1))).is_none());

        let generation = engine.issue(&p, &position);
        engine.commit(&p, generation, &ComputationOutcome::NoPrice);
        assert!(engine.evaluate(&p, &position, &custodies, &marks(dec!(1))).is_none());
    }

    #[test]
    fn price_computed_for_an_earlier_position_state_is_not_used() {
        let p = position_address("p");
        let mut engine = engine_with_price(&p, dec!(90));
        let mut topped_up = long("c-sol");
        topped_up.collateral_usd += 500;

        assert!(engine
            .evaluate(&p, &topped_up, &custodies(), &marks(dec!(89)))
            .is_none());
        assert!(engine
            .evaluate(&p, &long("c-sol"), &custodies(), &marks(dec!(89)))
            .is_some());

        engine.remove(&p);
        assert_eq!(engine.state(&p), EntryState::Uncomputed);
    }

    #[test]
    fn missing_custody_or_mark_price_skips() {
        let p = position_address("p");
        let orphan = long("c-unknown");
        let mut engine = DecisionEngine::new();
        let generation = engine.issue(&p, &orphan);
        engine.commit(&p, generation, &ComputationOutcome::Computed(dec!(90)));
        assert!(engine.evaluate(&p, &orphan, &custodies(), &marks(dec!(1))).is_none());

        let engine = engine_with_price(&p, dec!(90));

        let position = long("c-sol");
        assert!(engine
            .evaluate(&p, &position, &custodies(), &MarkPrices::new())
            .is_none());
    }

    #[test]
    fn evaluate_all_flags_only_eligible_positions() {
        let healthy = position_address("healthy");
        let underwater = position_address("underwater");
        let mut engine = DecisionEngine::new();
        for (address, price) in [(&healthy, dec!(50)), (&underwater, dec!(95))] {
            let generation = engine.issue(address, &long("c-sol"));
            engine.commit(address, generation, &ComputationOutcome::Computed(price));
        }
        let positions = [(healthy.clone(), long("c-sol")), (underwater.clone(), long("c-sol"))];

        let targets = engine.evaluate_all(
            positions.iter().map(|(a, p)| (a, p)),
            &custodies(),
            &marks(dec!(94)),
        );

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].address, underwater);
    }
}
