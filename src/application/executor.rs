//! Liquidation execution: simulate, then submit.
//!
//! Rejections are the common case (another liquidator got there first, the
//! position was topped up, the price moved back) and never surface as errors.
//! An attempt reports whether the position account is gone afterwards, so the
//! caller can stop tracking it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::domain::{LiquidationTarget, PositionAddress};
use crate::error::{Error, ExecutionError};
use crate::port::LiquidationSubmitter;

/// How a liquidation attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The liquidation was submitted and confirmed.
    Liquidated,
    /// Simulation found the position account already closed.
    Closed,
    /// Rejected, failed, skipped or a dry run. The position is still open.
    NotLiquidated,
}

impl AttemptOutcome {
    /// Whether the position account no longer exists after the attempt.
    #[must_use]
    pub const fn position_gone(self) -> bool {
        matches!(self, Self::Liquidated | Self::Closed)
    }
}

/// Execution counters for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    pub attempted: u64,
    pub rejected: u64,
    pub liquidated: u64,
    pub failed: u64,
}

/// Attempts liquidations, at most one in flight per position.
pub struct LiquidationExecutor {
    submitter: Arc<dyn LiquidationSubmitter>,
    dry_run: bool,
    in_flight: DashMap<PositionAddress, DateTime<Utc>>,
    attempted: AtomicU64,
    rejected: AtomicU64,
    liquidated: AtomicU64,
    failed: AtomicU64,
}

/// Clears a position's in-flight marker when the attempt ends.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<PositionAddress, DateTime<Utc>>,
    address: &'a PositionAddress,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(self.address);
    }
}

impl LiquidationExecutor {
    pub fn new(submitter: Arc<dyn LiquidationSubmitter>, dry_run: bool) -> Self {
        Self {
            submitter,
            dry_run,
            in_flight: DashMap::new(),
            attempted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            liquidated: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Try to liquidate a flagged position.
    ///
    /// Returns `true` only if a liquidation transaction was submitted and
    /// confirmed. Simulation rejections, submission failures, dry runs and
    /// attempts skipped because one is already in flight all return `false`.
    pub async fn try_liquidate(&self, target: &LiquidationTarget) -> bool {
        self.attempt(target).await == AttemptOutcome::Liquidated
    }

    /// Try to liquidate a flagged position, reporting how the attempt ended.
    pub async fn attempt(&self, target: &LiquidationTarget) -> AttemptOutcome {
        match self.in_flight.entry(target.address.clone()) {
            Entry::Occupied(started) => {
                debug!(
                    position = %target.address,
                    since = %started.get(),
                    "Liquidation already in flight, skipping"
                );
                return AttemptOutcome::NotLiquidated;
            }
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
            }
        }
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            address: &target.address,
        };
        self.attempted.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.submitter.simulate_liquidation(target).await {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            if let Error::Execution(ExecutionError::PositionClosed(reason)) = &e {
                info!(position = %target.address, reason = %reason, "Position already closed");
                return AttemptOutcome::Closed;
            }
            debug!(position = %target.address, reason = %e, "Liquidation simulation rejected");
            return AttemptOutcome::NotLiquidated;
        }

        if self.dry_run {
            info!(
                position = %target.address,
                owner = %target.position.owner,
                side = %target.position.side,
                "Dry run: would liquidate"
            );
            return AttemptOutcome::NotLiquidated;
        }

        match self.submitter.submit_liquidation(target).await {
            Ok(signature) => {
                self.liquidated.fetch_add(1, Ordering::Relaxed);
                info!(
                    position = %target.address,
                    owner = %target.position.owner,
                    side = %target.position.side,
                    signature = %signature,
                    "Position liquidated"
                );
                AttemptOutcome::Liquidated
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(position = %target.address, error = %e, "Liquidation submission failed");
                AttemptOutcome::NotLiquidated
            }
        }
    }

    #[must_use]
    pub fn is_in_flight(&self, address: &PositionAddress) -> bool {
        self.in_flight.contains_key(address)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            liquidated: self.liquidated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{custody, long, position_address};
    use crate::testkit::execution::MockSubmitter;
    use crate::testkit::ledger::wait_until;

    fn target(address: &str) -> LiquidationTarget {
        LiquidationTarget {
            address: position_address(address),
            position: long("c-sol"),
            custody: custody("sol"),
        }
    }

    #[tokio::test]
    async fn simulates_then_submits() {
        let submitter = Arc::new(MockSubmitter::new());
        let executor = LiquidationExecutor::new(submitter.clone(), false);

        assert!(executor.try_liquidate(&target("p")).await);

        assert_eq!(submitter.simulations(), 1);
        assert_eq!(submitter.submitted(), vec![position_address("p")]);
        assert_eq!(executor.stats().liquidated, 1);
        assert!(!executor.is_in_flight(&position_address("p")));
    }

    #[tokio::test]
    async fn already_liquidated_position_returns_false() {
        let submitter = Arc::new(MockSubmitter::new());
        submitter.reject(position_address("gone"));
        let executor = LiquidationExecutor::new(submitter.clone(), false);

        assert!(!executor.try_liquidate(&target("gone")).await);

        assert!(submitter.submitted().is_empty());
        assert_eq!(executor.stats().rejected, 1);
        assert!(!executor.is_in_flight(&position_address("gone")));
    }

    #[tokio::test]
    async fn submission_failure_returns_false() {
        let submitter = Arc::new(MockSubmitter::new());
        submitter.fail_submissions(true);
        let executor = LiquidationExecutor::new(submitter.clone(), false);

        assert!(!executor.try_liquidate(&target("p")).await);
        assert_eq!(executor.stats().failed, 1);
    }

    #[tokio::test]
    async fn dry_run_simulates_but_never_submits() {
        let submitter = Arc::new(MockSubmitter::new());
        let executor = LiquidationExecutor::new(submitter.clone(), true);

        assert!(!executor.try_liquidate(&target("p")).await);

        assert_eq!(submitter.simulations(), 1);
        assert!(submitter.submitted().is_empty());
    }

    #[tokio::test]
    async fn concurrent_attempt_for_same_position_is_skipped() {
        let submitter = Arc::new(MockSubmitter::new());
        let gate = submitter.hold_submissions();
        let executor = Arc::new(LiquidationExecutor::new(submitter.clone(), false));

        let first = tokio::spawn({
            let executor = executor.clone();
            async move { executor.try_liquidate(&target("p")).await }
        });
        wait_until(|| executor.is_in_flight(&position_address("p"))).await;

        assert!(!executor.try_liquidate(&target("p")).await);
        assert_eq!(submitter.simulations(), 1);

        gate.notify_one();
        assert!(first.await.unwrap());
        assert!(!executor.is_in_flight(&position_address("p")));

        // A later attempt goes through once the first has finished.
        gate.notify_one();
        assert!(executor.try_liquidate(&target("p")).await);
        assert_eq!(submitter.submitted().len(), 2);
    }

    #[tokio::test]
    async fn closed_position_is_reported_gone() {
        let submitter = Arc::new(MockSubmitter::new());
        submitter.close(position_address("p"));
        let executor = LiquidationExecutor::new(submitter.clone(), false);

        let outcome = executor.attempt(&target("p")).await;

        assert_eq!(outcome, AttemptOutcome::Closed);
        assert!(outcome.position_gone());
        assert!(submitter.submitted().is_empty());
        assert_eq!(executor.stats().rejected, 1);
    }

    #[tokio::test]
    async fn only_liquidated_and_closed_positions_are_gone() {
        let submitter = Arc::new(MockSubmitter::new());
        submitter.reject(position_address("healthy"));
        let executor = LiquidationExecutor::new(submitter.clone(), false);

        assert_eq!(
            executor.attempt(&target("healthy")).await,
            AttemptOutcome::NotLiquidated
        );
        let outcome = executor.attempt(&target("p")).await;
        assert_eq!(outcome, AttemptOutcome::Liquidated);
        assert!(outcome.position_gone());
        assert!(!AttemptOutcome::NotLiquidated.position_gone());
    }
}
