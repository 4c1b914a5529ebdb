//! The liquidator agent event loop.
//!
//! One task owns all mutable decision state: the liquidation price cache and
//! the latest mark prices. Position mutations, price changes and completed
//! view calls arrive as [`AgentEvent`]s on a single channel and are handled in
//! order. View calls and liquidation attempts run in spawned tasks and report
//! back through the same channel, so a computation can finish after any
//! number of later mutations; the generation check on commit keeps only the
//! most recently issued one.
//!
//! The position store's mirror can run ahead of the queue: a price change
//! handled before a queued mutation sees the mutated position. Liquidation
//! prices are bound to the position state they were issued for, so such a
//! position is skipped until its recomputation commits. Positions whose
//! account is gone after a liquidation attempt are dropped from the mirror
//! and the cache. The agent holds back further attempts on a position until
//! the outcome of the previous one has been handled, so a price change queued
//! behind a successful liquidation does not trigger another.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::cache::CustodyCache;
use super::decision::DecisionEngine;
use super::executor::{AttemptOutcome, LiquidationExecutor};
use super::position_store::PositionStore;
use super::price_feed::PriceFeed;
use super::retry::RetryPolicy;
use crate::domain::{
    AssetId, CommitResult, ComputationOutcome, EntryState, Generation, LiquidationTarget,
    MarkPrices, OracleAccount, Position, PositionAddress,
};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::{
    CustodySource, LiquidationPriceView, LiquidationSubmitter, PositionSource, PriceOracle,
};

/// Input to the agent loop.
#[derive(Debug)]
pub enum AgentEvent {
    /// A position account was created or mutated.
    PositionChanged {
        address: PositionAddress,
        position: Position,
    },
    /// At least one mark price changed; carries the full price cache.
    PricesChanged(MarkPrices),
    /// A liquidation price computation finished.
    LiquidationPriceResolved {
        address: PositionAddress,
        generation: Generation,
        outcome: ComputationOutcome,
    },
    /// A liquidation attempt finished.
    LiquidationAttempted {
        address: PositionAddress,
        position: Position,
        outcome: AttemptOutcome,
    },
}

/// Collaborators the agent talks to.
pub struct AgentPorts {
    pub positions: Arc<dyn PositionSource>,
    pub custodies: Arc<dyn CustodySource>,
    pub view: Arc<dyn LiquidationPriceView>,
    pub oracle: Arc<dyn PriceOracle>,
    pub submitter: Arc<dyn LiquidationSubmitter>,
}

/// Agent tuning.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub oracle_accounts: Vec<(AssetId, OracleAccount)>,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub dry_run: bool,
    pub status_interval: Duration,
}

impl AgentSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            oracle_accounts: config.oracle.accounts(),
            poll_interval: Duration::from_millis(config.oracle.poll_interval_ms),
            retry: RetryPolicy::new(config.retry.clone()),
            dry_run: config.dry_run,
            status_interval: Duration::from_secs(config.status_interval_secs),
        }
    }
}

/// Watches positions and prices and liquidates what is eligible.
pub struct Agent {
    store: PositionStore,
    feed: PriceFeed,
    custodies: Arc<CustodyCache>,
    custody_source: Arc<dyn CustodySource>,
    view: Arc<dyn LiquidationPriceView>,
    executor: Arc<LiquidationExecutor>,
    attempting: HashSet<PositionAddress>,
    engine: DecisionEngine,
    marks: MarkPrices,
    retry: RetryPolicy,
    status_interval: Duration,
    events_tx: mpsc::UnboundedSender<AgentEvent>,
    events_rx: mpsc::UnboundedReceiver<AgentEvent>,
    started_at: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(ports: AgentPorts, settings: AgentSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store: PositionStore::new(ports.positions, settings.retry.clone()),
            feed: PriceFeed::new(
                ports.oracle,
                settings.oracle_accounts,
                settings.poll_interval,
                settings.retry.clone(),
            ),
            custodies: Arc::new(CustodyCache::new()),
            custody_source: ports.custodies,
            view: ports.view,
            executor: Arc::new(LiquidationExecutor::new(ports.submitter, settings.dry_run)),
            attempting: HashSet::new(),
            engine: DecisionEngine::new(),
            marks: MarkPrices::new(),
            retry: settings.retry,
            status_interval: settings.status_interval,
            events_tx,
            events_rx,
            started_at: None,
        }
    }

    /// Load custodies, start the position store, issue a computation for
    /// every known position, then start the price feed.
    ///
    /// # Errors
    ///
    /// Fails if custodies or positions cannot be loaded after retries.
    pub async fn start(&mut self) -> Result<()> {
        let custodies = self
            .retry
            .run("load_all_custodies", || {
                self.custody_source.load_all_custodies()
            })
            .await?;
        info!(custodies = custodies.len(), "Custodies loaded");
        for (address, custody) in custodies {
            self.custodies.insert(address, custody);
        }

        let tx = self.events_tx.clone();
        let snapshot = self
            .store
            .start(move |address, position| {
                let _ = tx.send(AgentEvent::PositionChanged { address, position });
            })
            .await?;
        for (address, position) in snapshot.positions {
            self.issue_computation(address, position);
        }

        let tx = self.events_tx.clone();
        self.feed.start_listening(move |prices| {
            let _ = tx.send(AgentEvent::PricesChanged(prices));
        });

        self.started_at = Some(Utc::now());
        info!(
            positions = self.store.len(),
            dry_run = self.executor.is_dry_run(),
            "Agent started"
        );
        Ok(())
    }

    /// Start, then handle events until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns startup failures. Once running, nothing is fatal.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if let Err(e) = self.start().await {
            self.shutdown();
            return Err(e);
        }

        let mut status = tokio::time::interval(self.status_interval);
        status.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = status.tick() => self.log_status(),
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Wait for the next event and handle it. Returns false if the channel closed.
    pub async fn process_next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    pub fn handle_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::PositionChanged { address, position } => {
                self.issue_computation(address, position);
            }
            AgentEvent::PricesChanged(marks) => {
                self.marks = marks;
                let positions = self.store.snapshot();
                let targets = self.engine.evaluate_all(
                    positions.iter().map(|(address, position)| (address, position)),
                    &self.custodies,
                    &self.marks,
                );
                for target in targets {
                    self.liquidate(target);
                }
            }
            AgentEvent::LiquidationPriceResolved {
                address,
                generation,
                outcome,
            } => self.resolve(&address, generation, &outcome),
            AgentEvent::LiquidationAttempted {
                address,
                position,
                outcome,
            } => {
                self.attempting.remove(&address);
                if outcome.position_gone() {
                    self.forget(&address, &position);
                }
            }
        }
    }

    /// Stop the price feed and the position store, and drop queued events.
    pub fn shutdown(&mut self) {
        self.feed.stop_listening();
        self.store.stop();

        let mut dropped = 0;
        while self.events_rx.try_recv().is_ok() {
            dropped += 1;
        }
        self.attempting.clear();
        info!(dropped_events = dropped, "Agent stopped");
    }

    #[must_use]
    pub fn liquidation_state(&self, address: &PositionAddress) -> EntryState {
        self.engine.state(address)
    }

    #[must_use]
    pub fn liquidation_price(&self, address: &PositionAddress) -> Option<Decimal> {
        self.engine.liquidation_price(address)
    }

    #[must_use]
    pub fn positions(&self) -> &PositionStore {
        &self.store
    }

    #[must_use]
    pub fn mark_prices(&self) -> &MarkPrices {
        &self.marks
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<LiquidationExecutor> {
        &self.executor
    }

    fn issue_computation(&mut self, address: PositionAddress, position: Position) {
        let generation = self.engine.issue(&address, &position);
        debug!(position = %address, generation = %generation, "Computing liquidation price");

        let custodies = self.custodies.clone();
        let custody_source = self.custody_source.clone();
        let view = self.view.clone();
        let retry = self.retry.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = compute_liquidation_price(
                &custodies,
                custody_source.as_ref(),
                view.as_ref(),
                &retry,
                &address,
                &position,
            )
            .await;
            let _ = tx.send(AgentEvent::LiquidationPriceResolved {
                address,
                generation,
                outcome,
            });
        });
    }

    fn resolve(
        &mut self,
        address: &PositionAddress,
        generation: Generation,
        outcome: &ComputationOutcome,
    ) {
        match self.engine.commit(address, generation, outcome) {
            CommitResult::Fresh => {
                debug!(
                    position = %address,
                    generation = %generation,
                    liquidation_price = ?self.engine.liquidation_price(address),
                    "Liquidation price updated"
                );
                let Some(position) = self.store.get(address) else {
                    return;
                };
                if let Some(target) =
                    self.engine
                        .evaluate(address, &position, &self.custodies, &self.marks)
                {
                    self.liquidate(target);
                }
            }
            CommitResult::Failed => match outcome {
                ComputationOutcome::UnknownCustody => warn!(
                    position = %address,
                    custody = ?self.store.get(address).map(|p| p.custody),
                    "Position references a custody that does not exist"
                ),
                ComputationOutcome::Failed(reason) => warn!(
                    position = %address,
                    generation = %generation,
                    reason = %reason,
                    "Liquidation price computation failed"
                ),
                ComputationOutcome::NoPrice | ComputationOutcome::Computed(_) => debug!(
                    position = %address,
                    generation = %generation,
                    "No liquidation price for position"
                ),
            },
            CommitResult::Superseded => {}
        }
    }

    fn liquidate(&mut self, target: LiquidationTarget) {
        if !self.attempting.insert(target.address.clone()) {
            debug!(position = %target.address, "Liquidation attempt outstanding, skipping");
            return;
        }
        let executor = self.executor.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = executor.attempt(&target).await;
            let _ = tx.send(AgentEvent::LiquidationAttempted {
                address: target.address,
                position: target.position,
                outcome,
            });
        });
    }

    /// Stop tracking a closed position, unless it changed since the attempt.
    fn forget(&mut self, address: &PositionAddress, position: &Position) {
        if self.store.remove_if_unchanged(address, position) {
            self.engine.remove(address);
            info!(position = %address, "Stopped tracking closed position");
        } else {
            debug!(position = %address, "Position changed since liquidation attempt, keeping it");
        }
    }

    fn log_status(&self) {
        let cache = self.engine.stats();
        let execution = self.executor.stats();
        let uptime_secs = self
            .started_at
            .map_or(0, |started| (Utc::now() - started).num_seconds());
        info!(
            uptime_secs,
            positions = self.store.len(),
            custodies = self.custodies.len(),
            prices = self.marks.len(),
            fresh = cache.fresh,
            pending = cache.pending,
            failed = cache.failed,
            attempted = execution.attempted,
            liquidated = execution.liquidated,
            in_flight = self.executor.in_flight_count(),
            "Agent status"
        );
    }
}

/// Resolve the position's custody (fetching it if unknown), then run the view call.
async fn compute_liquidation_price(
    custodies: &CustodyCache,
    custody_source: &dyn CustodySource,
    view: &dyn LiquidationPriceView,
    retry: &RetryPolicy,
    address: &PositionAddress,
    position: &Position,
) -> ComputationOutcome {
    let custody = match retry
        .run("fetch_custody", || {
            custodies.resolve(custody_source, &position.custody)
        })
        .await
    {
        Ok(Some(custody)) => custody,
        Ok(None) => return ComputationOutcome::UnknownCustody,
        Err(e) => return ComputationOutcome::Failed(e.to_string()),
    };

    match retry
        .run("liquidation_price", || {
            view.liquidation_price(address, position, &custody)
        })
        .await
    {
        Ok(Some(price)) => ComputationOutcome::Computed(price),
        Ok(None) => ComputationOutcome::NoPrice,
        Err(e) => ComputationOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::config::fast_retry;
    use crate::testkit::domain::{
        asset, custody, custody_address, long, position_address, update,
    };
    use crate::testkit::execution::MockSubmitter;
    use crate::testkit::ledger::{wait_until, MockLedger, MockLiquidationView};
    use crate::testkit::oracle::MockOracle;
    use rust_decimal_macros::dec;

    struct Harness {
        ledger: Arc<MockLedger>,
        view: Arc<MockLiquidationView>,
        submitter: Arc<MockSubmitter>,
        agent: Agent,
    }

    fn harness(ledger: MockLedger, view: MockLiquidationView) -> Harness {
        let ledger = Arc::new(ledger);
        let view = Arc::new(view);
        let submitter = Arc::new(MockSubmitter::new());
        let agent = Agent::new(
            AgentPorts {
                positions: ledger.clone(),
                custodies: ledger.clone(),
                view: view.clone(),
                oracle: Arc::new(MockOracle::new()),
                submitter: submitter.clone(),
            },
            AgentSettings {
                oracle_accounts: vec![(asset("sol"), OracleAccount::from("sol-oracle"))],
                poll_interval: Duration::from_secs(3600),
                retry: fast_retry(),
                dry_run: false,
                status_interval: Duration::from_secs(60),
            },
        );
        Harness {
            ledger,
            view,
            submitter,
            agent,
        }
    }

    fn sol_ledger() -> MockLedger {
        MockLedger::new().with_custody(custody_address("c-sol"), custody("sol"))
    }

    fn marks(price: Decimal) -> MarkPrices {
        let mut marks = MarkPrices::new();
        marks.insert(asset("sol"), price);
        marks
    }

    async fn next(agent: &mut Agent) {
        tokio::time::timeout(Duration::from_secs(1), agent.process_next_event())
            .await
            .expect("no agent event within one second");
    }

    #[tokio::test]
    async fn late_result_of_superseded_computation_is_discarded() {
        let p = position_address("p");
        let view = MockLiquidationView::new();
        let first = view.defer(p.clone());
        let second = view.defer(p.clone());
        let mut h = harness(sol_ledger(), view);
        h.agent.start().await.unwrap();

        let mut changed = long("c-sol");
        changed.collateral_usd += 1;
        h.ledger.push(update("p", long("c-sol"), 1)).await;
        next(&mut h.agent).await;
        wait_until(|| h.view.calls() == 1).await;
        h.ledger.push(update("p", changed, 2)).await;
        next(&mut h.agent).await;
        wait_until(|| h.view.calls() == 2).await;

        first.resolve(dec!(80));
        next(&mut h.agent).await;
        assert_eq!(h.agent.liquidation_state(&p), EntryState::Pending);
        assert_eq!(h.agent.liquidation_price(&p), None);

        second.resolve(dec!(95));
        next(&mut h.agent).await;
        assert_eq!(h.agent.liquidation_state(&p), EntryState::Fresh);
        assert_eq!(h.agent.liquidation_price(&p), Some(dec!(95)));
    }

    #[tokio::test]
    async fn snapshot_positions_are_computed_and_liquidated_on_price_drop() {
        let p = position_address("p");
        let ledger = sol_ledger().with_positions(1, vec![(p.clone(), long("c-sol"))]);
        let view = MockLiquidationView::new().with_price(p.clone(), dec!(90));
        let mut h = harness(ledger, view);
        h.agent.start().await.unwrap();

        next(&mut h.agent).await;
        assert_eq!(h.agent.liquidation_price(&p), Some(dec!(90)));

        for mark in [dec!(100), dec!(95)] {
            h.agent.handle_event(AgentEvent::PricesChanged(marks(mark)));
        }
        tokio::task::yield_now().await;
        assert_eq!(h.submitter.simulations(), 0);

        h.agent.handle_event(AgentEvent::PricesChanged(marks(dec!(89))));
        wait_until(|| h.submitter.submitted().len() == 1).await;
        assert_eq!(h.submitter.submitted(), vec![p]);
    }

    #[tokio::test]
    async fn price_change_ahead_of_a_queued_mutation_waits_for_recomputation() {
        let p = position_address("p");
        let ledger = sol_ledger().with_positions(1, vec![(p.clone(), long("c-sol"))]);
        let view = MockLiquidationView::new().with_price(p.clone(), dec!(90));
        let mut h = harness(ledger, view);
        h.agent.start().await.unwrap();
        next(&mut h.agent).await;
        assert_eq!(h.agent.liquidation_price(&p), Some(dec!(90)));

        let mut topped_up = long("c-sol");
        topped_up.collateral_usd += 500;
        h.ledger.push(update("p", topped_up.clone(), 2)).await;
        wait_until(|| h.agent.positions().get(&p) == Some(topped_up.clone())).await;

        // The mutation is still queued behind this price change.
        h.agent.handle_event(AgentEvent::PricesChanged(marks(dec!(89))));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.submitter.simulations(), 0);

        next(&mut h.agent).await;
        assert_eq!(h.agent.liquidation_state(&p), EntryState::Pending);
        next(&mut h.agent).await;
        wait_until(|| h.submitter.submitted().len() == 1).await;
    }

    #[tokio::test]
    async fn liquidated_position_is_dropped_and_not_retried() {
        let p = position_address("p");
        let ledger = sol_ledger().with_positions(1, vec![(p.clone(), long("c-sol"))]);
        let view = MockLiquidationView::new().with_price(p.clone(), dec!(90));
        let mut h = harness(ledger, view);
        h.agent.start().await.unwrap();
        next(&mut h.agent).await;

        h.agent.handle_event(AgentEvent::PricesChanged(marks(dec!(89))));
        next(&mut h.agent).await;

        assert_eq!(h.submitter.submitted(), vec![p.clone()]);
        assert_eq!(h.agent.positions().get(&p), None);
        assert_eq!(h.agent.liquidation_state(&p), EntryState::Uncomputed);

        for mark in [dec!(88), dec!(87)] {
            h.agent.handle_event(AgentEvent::PricesChanged(marks(mark)));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.submitter.simulations(), 1);
    }

    #[tokio::test]
    async fn already_closed_position_is_dropped() {
        let p = position_address("p");
        let ledger = sol_ledger().with_positions(1, vec![(p.clone(), long("c-sol"))]);
        let view = MockLiquidationView::new().with_price(p.clone(), dec!(90));
        let mut h = harness(ledger, view);
        h.submitter.close(p.clone());
        h.agent.start().await.unwrap();
        next(&mut h.agent).await;

        h.agent.handle_event(AgentEvent::PricesChanged(marks(dec!(89))));
        next(&mut h.agent).await;

        assert!(h.agent.positions().is_empty());
        assert!(h.submitter.submitted().is_empty());
        assert_eq!(h.agent.liquidation_state(&p), EntryState::Uncomputed);
    }

    #[tokio::test]
    async fn fresh_commit_reevaluates_against_known_prices() {
        let p = position_address("p");
        let view = MockLiquidationView::new().with_price(p.clone(), dec!(90));
        let mut h = harness(sol_ledger(), view);
        h.agent.start().await.unwrap();
        h.agent.handle_event(AgentEvent::PricesChanged(marks(dec!(85))));

        h.ledger.push(update("p", long("c-sol"), 1)).await;
        next(&mut h.agent).await;
        next(&mut h.agent).await;

        wait_until(|| h.submitter.submitted().len() == 1).await;
    }

    #[tokio::test]
    async fn unknown_custody_is_fetched_lazily() {
        let p = position_address("p");
        let ledger = MockLedger::new().with_unlisted_custody(custody_address("c-new"), custody("sol"));
        let view = MockLiquidationView::new().with_price(p.clone(), dec!(90));
        let mut h = harness(ledger, view);
        h.agent.start().await.unwrap();

        h.ledger.push(update("p", long("c-new"), 1)).await;
        next(&mut h.agent).await;
        next(&mut h.agent).await;

        assert_eq!(h.agent.liquidation_state(&p), EntryState::Fresh);
        assert_eq!(h.ledger.custody_fetches(), 1);
    }

    #[tokio::test]
    async fn missing_custody_leaves_position_failed() {
        let p = position_address("p");
        let mut h = harness(MockLedger::new(), MockLiquidationView::new());
        h.agent.start().await.unwrap();

        h.ledger.push(update("p", long("ghost"), 1)).await;
        next(&mut h.agent).await;
        next(&mut h.agent).await;

        assert_eq!(h.agent.liquidation_state(&p), EntryState::Failed);
        assert_eq!(h.view.calls(), 0);
    }

    #[tokio::test]
    async fn view_failure_is_retried_then_marked_failed() {
        let p = position_address("p");
        let view = MockLiquidationView::new();
        view.set_failing(p.clone());
        let mut h = harness(sol_ledger(), view);
        h.agent.start().await.unwrap();

        h.ledger.push(update("p", long("c-sol"), 1)).await;
        next(&mut h.agent).await;
        next(&mut h.agent).await;

        assert_eq!(h.agent.liquidation_state(&p), EntryState::Failed);
        assert_eq!(h.view.calls(), 3);
    }

    #[tokio::test]
    async fn shutdown_stops_store_and_feed() {
        let ledger = sol_ledger().with_positions(1, vec![(position_address("p"), long("c-sol"))]);
        let mut h = harness(ledger, MockLiquidationView::new());
        h.agent.start().await.unwrap();
        assert!(h.ledger.is_subscribed());

        h.agent.shutdown();

        assert!(!h.ledger.is_subscribed());
        assert!(h.agent.positions().is_empty());
    }
}
