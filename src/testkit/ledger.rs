//! In-memory ledger for testing the position store, custody cache and agent.
//!
//! - [`MockLedger`] - Scripted positions and custodies with a controllable
//!   live subscription. Implements [`PositionSource`] and [`CustodySource`].
//! - [`MockLiquidationView`] - Fixed or deferred liquidation prices per
//!   position. Deferred answers let tests choose the order computations
//!   complete in.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, watch};

use crate::domain::{
    Custody, CustodyAddress, Position, PositionAddress, PositionSnapshot, PositionUpdate,
};
use crate::error::{Error, LedgerError, Result};
use crate::port::{
    CustodySource, LiquidationPriceView, PositionSource, PositionSubscription, SubscriptionHandle,
};

fn rpc_error(reason: &str) -> Error {
    LedgerError::Rpc(reason.to_string()).into()
}

/// Yield to other tasks until `done` holds, panicking after one second.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    let wait = async {
        while !done() {
            tokio::task::yield_now().await;
        }
    };
    tokio::time::timeout(Duration::from_secs(1), wait)
        .await
        .expect("condition not reached within one second");
}

// ---------------------------------------------------------------------------
// MockLedger
// ---------------------------------------------------------------------------

/// Scripted position and custody accounts.
///
/// Custodies added with [`with_custody`](Self::with_custody) are returned by
/// the bulk load; those added with [`with_unlisted_custody`](Self::with_unlisted_custody)
/// are only reachable through [`CustodySource::fetch_custody`], which is how
/// tests exercise the lazy custody path.
pub struct MockLedger {
    snapshot: Mutex<PositionSnapshot>,
    listed_custodies: Mutex<Vec<(CustodyAddress, Custody)>>,
    unlisted_custodies: Mutex<HashMap<CustodyAddress, Custody>>,
    during_load: Mutex<Vec<PositionUpdate>>,
    live: Mutex<Option<(mpsc::Sender<PositionUpdate>, watch::Receiver<bool>)>>,
    failing_loads: AtomicU32,
    subscribe_count: AtomicU32,
    custody_fetches: AtomicU32,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(PositionSnapshot::default()),
            listed_custodies: Mutex::new(Vec::new()),
            unlisted_custodies: Mutex::new(HashMap::new()),
            during_load: Mutex::new(Vec::new()),
            live: Mutex::new(None),
            failing_loads: AtomicU32::new(0),
            subscribe_count: AtomicU32::new(0),
            custody_fetches: AtomicU32::new(0),
        }
    }

    /// Positions returned by the bulk load, tagged with `slot`.
    pub fn with_positions(self, slot: u64, positions: Vec<(PositionAddress, Position)>) -> Self {
        *self.snapshot.lock().unwrap() = PositionSnapshot { slot, positions };
        self
    }

    pub fn with_custody(self, address: CustodyAddress, custody: Custody) -> Self {
        self.listed_custodies.lock().unwrap().push((address, custody));
        self
    }

    pub fn with_unlisted_custody(self, address: CustodyAddress, custody: Custody) -> Self {
        self.unlisted_custodies.lock().unwrap().insert(address, custody);
        self
    }

    /// Deliver `update` through the live subscription while the bulk load runs.
    pub fn deliver_during_load(self, update: PositionUpdate) -> Self {
        self.during_load.lock().unwrap().push(update);
        self
    }

    /// Fail the next `n` bulk position loads.
    pub fn fail_next_loads(&self, n: u32) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    /// Push a mutation through the live subscription.
    ///
    /// Returns false if nothing is subscribed.
    pub async fn push(&self, update: PositionUpdate) -> bool {
        let sender = match self.live.lock().unwrap().as_ref() {
            Some((tx, stop)) if !*stop.borrow() => tx.clone(),
            _ => return false,
        };
        sender.send(update).await.is_ok()
    }

    /// Whether a subscription is open and has not been ended.
    pub fn is_subscribed(&self) -> bool {
        match self.live.lock().unwrap().as_ref() {
            Some((_, stop)) => !*stop.borrow() && stop.has_changed().is_ok(),
            None => false,
        }
    }

    pub fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    pub fn custody_fetches(&self) -> u32 {
        self.custody_fetches.load(Ordering::SeqCst)
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionSource for MockLedger {
    async fn load_all_positions(&self) -> Result<PositionSnapshot> {
        if self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(rpc_error("getProgramAccounts timed out"));
        }

        let racing: Vec<PositionUpdate> = self.during_load.lock().unwrap().drain(..).collect();
        let sender = self.live.lock().unwrap().as_ref().map(|(tx, _)| tx.clone());
        if let Some(sender) = sender {
            for update in racing {
                let _ = sender.try_send(update);
            }
        }

        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn subscribe_positions(&self) -> Result<PositionSubscription> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        let (tx, updates) = mpsc::channel(64);
        let (handle, stop) = SubscriptionHandle::channel();
        *self.live.lock().unwrap() = Some((tx, stop));
        Ok(PositionSubscription { updates, handle })
    }
}

#[async_trait]
impl CustodySource for MockLedger {
    async fn load_all_custodies(&self) -> Result<Vec<(CustodyAddress, Custody)>> {
        Ok(self.listed_custodies.lock().unwrap().clone())
    }

    async fn fetch_custody(&self, address: &CustodyAddress) -> Result<Option<Custody>> {
        self.custody_fetches.fetch_add(1, Ordering::SeqCst);
        let listed = self
            .listed_custodies
            .lock()
            .unwrap()
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, c)| c.clone());
        Ok(listed.or_else(|| self.unlisted_custodies.lock().unwrap().get(address).cloned()))
    }
}

// ---------------------------------------------------------------------------
// MockLiquidationView
// ---------------------------------------------------------------------------

type ViewAnswer = Result<Option<Decimal>>;

/// Answer for one deferred view call, completed by the test.
pub struct DeferredView(oneshot::Sender<ViewAnswer>);

impl DeferredView {
    pub fn resolve(self, price: Decimal) {
        let _ = self.0.send(Ok(Some(price)));
    }

    pub fn resolve_none(self) {
        let _ = self.0.send(Ok(None));
    }

    pub fn fail(self, reason: &str) {
        let _ = self.0.send(Err(rpc_error(reason)));
    }
}

/// Liquidation price view with per-position answers.
///
/// A deferred answer queued with [`defer`](Self::defer) is consumed by the
/// next call for that position, in call order. Without one, the call returns
/// the fixed price set with [`set_price`](Self::set_price), fails if the
/// position is marked failing, or returns `None`.
pub struct MockLiquidationView {
    prices: Mutex<HashMap<PositionAddress, Decimal>>,
    deferred: Mutex<HashMap<PositionAddress, VecDeque<oneshot::Receiver<ViewAnswer>>>>,
    failing: Mutex<HashSet<PositionAddress>>,
    calls: AtomicU32,
}

impl MockLiquidationView {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            deferred: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_price(self, address: PositionAddress, price: Decimal) -> Self {
        self.set_price(address, price);
        self
    }

    pub fn set_price(&self, address: PositionAddress, price: Decimal) {
        self.prices.lock().unwrap().insert(address, price);
    }

    /// Make every undeferred call for `address` fail.
    pub fn set_failing(&self, address: PositionAddress) {
        self.failing.lock().unwrap().insert(address);
    }

    /// Queue a deferred answer for the next call on `address`.
    pub fn defer(&self, address: PositionAddress) -> DeferredView {
        let (tx, rx) = oneshot::channel();
        self.deferred
            .lock()
            .unwrap()
            .entry(address)
            .or_default()
            .push_back(rx);
        DeferredView(tx)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockLiquidationView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiquidationPriceView for MockLiquidationView {
    async fn liquidation_price(
        &self,
        address: &PositionAddress,
        _position: &Position,
        _custody: &Custody,
    ) -> Result<Option<Decimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let deferred = self
            .deferred
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(VecDeque::pop_front);
        if let Some(answer) = deferred {
            return answer
                .await
                .unwrap_or_else(|_| Err(rpc_error("deferred answer dropped")));
        }

        if self.failing.lock().unwrap().contains(address) {
            return Err(rpc_error("simulation node unavailable"));
        }
        Ok(self.prices.lock().unwrap().get(address).copied())
    }
}
