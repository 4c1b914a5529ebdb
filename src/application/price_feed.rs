//! Oracle price polling with change detection.
//!
//! The feed is a self re-arming loop: poll every configured price account in
//! one batch, fold the observations into [`MarkPrices`], notify if anything
//! changed, then sleep for the poll interval. A slow poll delays the next one.
//! Stopping and notifying share the price lock, so once `stop_listening`
//! returns no further notification is delivered.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::domain::{AssetId, MarkPrices, OracleAccount};
use crate::port::PriceOracle;

/// Polls the oracle and reports mark price changes.
pub struct PriceFeed {
    oracle: Arc<dyn PriceOracle>,
    accounts: Arc<Vec<(AssetId, OracleAccount)>>,
    interval: Duration,
    retry: RetryPolicy,
    prices: Arc<RwLock<MarkPrices>>,
    running: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl PriceFeed {
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        accounts: Vec<(AssetId, OracleAccount)>,
        interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            oracle,
            accounts: Arc::new(accounts),
            interval,
            retry,
            prices: Arc::new(RwLock::new(MarkPrices::new())),
            running: None,
        }
    }

    /// Current mark prices.
    #[must_use]
    pub fn prices(&self) -> MarkPrices {
        self.prices.read().clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start polling. `on_change` receives the full price cache each time at
    /// least one asset's conservative price changed.
    ///
    /// Calling this while already running is a no-op.
    pub fn start_listening<F>(&mut self, on_change: F)
    where
        F: Fn(MarkPrices) + Send + Sync + 'static,
    {
        if self.running.is_some() {
            warn!("Price feed already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            self.oracle.clone(),
            self.accounts.clone(),
            self.interval,
            self.retry.clone(),
            self.prices.clone(),
            on_change,
            stop_rx,
        ));
        self.running = Some((stop_tx, task));

        info!(
            accounts = self.accounts.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Price feed started"
        );
    }

    /// Stop polling.
    ///
    /// A poll already in flight is left to finish, but its result is dropped
    /// and no further poll is scheduled. No notification is delivered after
    /// this returns.
    pub fn stop_listening(&mut self) {
        if let Some((stop, _task)) = self.running.take() {
            // Notifications are emitted under this lock after a stop check.
            let _prices = self.prices.write();
            let _ = stop.send(true);
            info!("Price feed stopped");
        }
    }
}

impl Drop for PriceFeed {
    fn drop(&mut self) {
        if let Some((stop, _)) = self.running.take() {
            let _ = stop.send(true);
        }
    }
}

async fn poll_loop<F>(
    oracle: Arc<dyn PriceOracle>,
    accounts: Arc<Vec<(AssetId, OracleAccount)>>,
    interval: Duration,
    retry: RetryPolicy,
    prices: Arc<RwLock<MarkPrices>>,
    on_change: F,
    mut stop: watch::Receiver<bool>,
) where
    F: Fn(MarkPrices) + Send + Sync + 'static,
{
    loop {
        let polled = retry
            .run("poll_prices", || oracle.poll_prices(&accounts))
            .await;

        if *stop.borrow() {
            debug!("Price feed stopped during poll, dropping result");
            break;
        }

        match polled {
            Ok(observed) => {
                let mut prices = prices.write();
                if *stop.borrow() {
                    break;
                }
                if prices.apply(&observed) {
                    debug!(assets = prices.len(), "Mark prices changed");
                    on_change(prices.clone());
                }
            }
            Err(e) => {
                warn!(error = %e, "Price poll failed, keeping last prices");
            }
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow() || stop.has_changed().is_err() {
            break;
        }
    }
}
