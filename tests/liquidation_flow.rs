//! End-to-end agent runs against in-memory ports.

use std::sync::Arc;
use std::time::Duration;

use perp_liquidator::application::{Agent, AgentPorts, AgentSettings};
use perp_liquidator::domain::{OracleAccount, Position};
use perp_liquidator::testkit::config::fast_retry;
use perp_liquidator::testkit::domain::{
    asset, custody, custody_address, long, observed, position_address, short, update,
};
use perp_liquidator::testkit::execution::MockSubmitter;
use perp_liquidator::testkit::ledger::{wait_until, MockLedger, MockLiquidationView};
use perp_liquidator::testkit::oracle::MockOracle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;

struct Flow {
    ledger: Arc<MockLedger>,
    view: Arc<MockLiquidationView>,
    oracle: Arc<MockOracle>,
    submitter: Arc<MockSubmitter>,
}

impl Flow {
    fn new(ledger: MockLedger, view: MockLiquidationView, marks: &[Decimal]) -> Self {
        let polls = marks
            .iter()
            .map(|mark| observed(&[("sol", *mark, Decimal::ZERO)]))
            .collect();
        Self {
            ledger: Arc::new(ledger),
            view: Arc::new(view),
            oracle: Arc::new(MockOracle::new().with_polls(polls)),
            submitter: Arc::new(MockSubmitter::new()),
        }
    }

    fn agent(&self, dry_run: bool) -> Agent {
        Agent::new(
            AgentPorts {
                positions: self.ledger.clone(),
                custodies: self.ledger.clone(),
                view: self.view.clone(),
                oracle: self.oracle.clone(),
                submitter: self.submitter.clone(),
            },
            AgentSettings {
                oracle_accounts: vec![(asset("sol"), OracleAccount::from("sol-oracle"))],
                poll_interval: Duration::from_millis(5),
                retry: fast_retry(),
                dry_run,
                status_interval: Duration::from_secs(60),
            },
        )
    }
}

fn sol_ledger(positions: Vec<(&str, Position)>) -> MockLedger {
    MockLedger::new()
        .with_custody(custody_address("c-sol"), custody("sol"))
        .with_positions(
            1,
            positions
                .into_iter()
                .map(|(address, position)| (position_address(address), position))
                .collect(),
        )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn falling_price_liquidates_exactly_once() {
    let risky = position_address("risky");
    let ledger = sol_ledger(vec![
        ("risky", long("c-sol")),
        ("safe", long("c-sol")),
        ("short", short("c-sol")),
    ]);
    let view = MockLiquidationView::new()
        .with_price(risky.clone(), dec!(90))
        .with_price(position_address("safe"), dec!(50))
        .with_price(position_address("short"), dec!(120));
    let flow = Flow::new(ledger, view, &[dec!(100), dec!(95), dec!(89)]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let running = tokio::spawn(flow.agent(false).run(shutdown_rx));

    wait_until(|| flow.submitter.submitted().len() == 1).await;
    wait_until(|| flow.oracle.polls() >= 6).await;
    assert_eq!(flow.submitter.submitted(), vec![risky]);

    shutdown_tx.send(true).unwrap();
    running.await.unwrap().unwrap();
    assert!(!flow.ledger.is_subscribed());
    assert_eq!(flow.submitter.submitted().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn liquidated_position_is_not_simulated_again_as_price_keeps_falling() {
    let risky = position_address("risky");
    let view = MockLiquidationView::new().with_price(risky.clone(), dec!(90));
    let flow = Flow::new(
        sol_ledger(vec![("risky", long("c-sol"))]),
        view,
        &[dec!(100), dec!(89), dec!(88), dec!(87)],
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let running = tokio::spawn(flow.agent(false).run(shutdown_rx));

    wait_until(|| flow.submitter.submitted().len() == 1).await;
    wait_until(|| flow.oracle.polls() >= 8).await;

    shutdown_tx.send(true).unwrap();
    running.await.unwrap().unwrap();
    assert_eq!(flow.submitter.submitted(), vec![risky]);
    assert_eq!(flow.submitter.simulations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn position_opened_after_start_is_tracked() {
    let late = position_address("late");
    let view = MockLiquidationView::new().with_price(late.clone(), dec!(90));
    let flow = Flow::new(sol_ledger(vec![]), view, &[dec!(85)]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let running = tokio::spawn(flow.agent(false).run(shutdown_rx));
    wait_until(|| flow.ledger.is_subscribed()).await;
    assert!(flow.ledger.push(update("late", long("c-sol"), 5)).await);

    wait_until(|| flow.submitter.submitted() == vec![late.clone()]).await;

    shutdown_tx.send(true).unwrap();
    running.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dry_run_simulates_without_submitting() {
    let risky = position_address("risky");
    let view = MockLiquidationView::new().with_price(risky, dec!(90));
    let flow = Flow::new(sol_ledger(vec![("risky", long("c-sol"))]), view, &[dec!(80)]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let running = tokio::spawn(flow.agent(true).run(shutdown_rx));
    wait_until(|| flow.submitter.simulations() == 1).await;

    shutdown_tx.send(true).unwrap();
    running.await.unwrap().unwrap();
    assert!(flow.submitter.submitted().is_empty());
}

#[tokio::test]
async fn startup_fails_when_positions_cannot_be_loaded() {
    let flow = Flow::new(sol_ledger(vec![]), MockLiquidationView::new(), &[]);
    flow.ledger.fail_next_loads(3);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let result = flow.agent(false).run(shutdown_rx).await;

    assert!(result.is_err());
    assert!(!flow.ledger.is_subscribed());
    assert_eq!(flow.oracle.polls(), 0);
}
