//! Liquidation price bookkeeping and executor input.
//!
//! Each position carries a [`LiquidationPriceEntry`]: the last accepted
//! liquidation price and the [`Generation`] of the computation currently in
//! flight. A computation's outcome is committed only when its generation is
//! still the one in flight, so the most recently *issued* computation wins
//! regardless of the order computations complete in.
//!
//! The entry also keeps the position state the latest computation was issued
//! for. A fresh price only applies to that exact state; any other copy of the
//! position is treated as not yet computed.

use std::fmt;

use rust_decimal::Decimal;

use super::custody::Custody;
use super::id::PositionAddress;
use super::position::Position;

/// Per-position computation counter.
///
/// Strictly increasing for a given position; zero means nothing was ever issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation of an entry that has never issued a computation.
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable state of a liquidation price entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No computation was ever issued.
    Uncomputed,
    /// A computation is in flight.
    Pending,
    /// The latest issued computation produced a price.
    Fresh,
    /// The latest issued computation failed or produced no price.
    Failed,
}

/// What a liquidation price computation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputationOutcome {
    /// The view call returned a price.
    Computed(Decimal),
    /// The view call returned no price.
    NoPrice,
    /// The position's custody does not exist on the ledger.
    UnknownCustody,
    /// The view call (or custody fetch) failed after retries.
    Failed(String),
}

/// Result of committing an outcome against an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// Outcome accepted; the entry now holds a fresh price.
    Fresh,
    /// Outcome accepted; the entry is failed.
    Failed,
    /// A newer computation was issued since; the outcome was discarded.
    Superseded,
}

/// Cached liquidation price of one position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidationPriceEntry {
    price: Option<Decimal>,
    in_flight: Option<Generation>,
    last_issued: Generation,
    basis: Option<Position>,
}

impl LiquidationPriceEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An entry whose first computation is numbered after `generation`.
    ///
    /// Used when an address is tracked again after being dropped, so results
    /// of computations issued before the drop can never match.
    #[must_use]
    pub fn starting_after(generation: Generation) -> Self {
        Self {
            last_issued: generation,
            ..Self::default()
        }
    }

    /// Issue a new computation for `basis`, superseding any in flight.
    pub fn issue(&mut self, basis: Position) -> Generation {
        self.last_issued = self.last_issued.next();
        self.in_flight = Some(self.last_issued);
        self.basis = Some(basis);
        self.last_issued
    }

    /// Commit a computation outcome tagged with the generation it was issued under.
    pub fn commit(&mut self, generation: Generation, outcome: &ComputationOutcome) -> CommitResult {
        if self.in_flight != Some(generation) {
            return CommitResult::Superseded;
        }
        self.in_flight = None;
        match outcome {
            ComputationOutcome::Computed(price) => {
                self.price = Some(*price);
                CommitResult::Fresh
            }
            ComputationOutcome::NoPrice
            | ComputationOutcome::UnknownCustody
            | ComputationOutcome::Failed(_) => {
                self.price = None;
                CommitResult::Failed
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> EntryState {
        if self.in_flight.is_some() {
            EntryState::Pending
        } else if self.price.is_some() {
            EntryState::Fresh
        } else if self.basis.is_none() {
            EntryState::Uncomputed
        } else {
            EntryState::Failed
        }
    }

    /// The liquidation price, only while the entry is fresh.
    #[must_use]
    pub fn fresh_price(&self) -> Option<Decimal> {
        match self.state() {
            EntryState::Fresh => self.price,
            _ => None,
        }
    }

    /// The liquidation price, only while the entry is fresh and was computed
    /// for exactly `position`.
    #[must_use]
    pub fn fresh_price_for(&self, position: &Position) -> Option<Decimal> {
        self.fresh_price().filter(|_| self.basis.as_ref() == Some(position))
    }

    /// Position state the latest computation was issued for.
    #[must_use]
    pub const fn basis(&self) -> Option<&Position> {
        self.basis.as_ref()
    }

    /// Generation of the latest issued computation.
    #[must_use]
    pub const fn last_issued(&self) -> Generation {
        self.last_issued
    }

    /// Generation of the computation in flight, if any.
    #[must_use]
    pub const fn in_flight(&self) -> Option<Generation> {
        self.in_flight
    }

    /// Last successfully computed price, regardless of state.
    #[must_use]
    pub const fn last_price(&self) -> Option<Decimal> {
        self.price
    }
}

/// Everything the executor needs to attempt one liquidation.
#[derive(Debug, Clone)]
pub struct LiquidationTarget {
    pub address: PositionAddress,
    pub position: Position,
    pub custody: Custody,
}
