//! Scripted [`PriceOracle`] for price feed and agent tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::{AssetId, OracleAccount, OraclePrice};
use crate::error::{LedgerError, Result};
use crate::port::PriceOracle;

/// A mock oracle with a queue of poll results.
///
/// Each poll pops the next scripted result. Once the script is exhausted the
/// last successful result is repeated, like a market that stopped moving.
pub struct MockOracle {
    script: Mutex<VecDeque<HashMap<AssetId, OraclePrice>>>,
    last: Mutex<HashMap<AssetId, OraclePrice>>,
    failing_polls: AtomicU32,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    polls: AtomicU32,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(HashMap::new()),
            failing_polls: AtomicU32::new(0),
            hold: Mutex::new(None),
            polls: AtomicU32::new(0),
        }
    }

    pub fn with_polls(self, polls: Vec<HashMap<AssetId, OraclePrice>>) -> Self {
        self.script.lock().unwrap().extend(polls);
        self
    }

    pub fn push_poll(&self, poll: HashMap<AssetId, OraclePrice>) {
        self.script.lock().unwrap().push_back(poll);
    }

    /// Fail the next `n` polls.
    pub fn fail_next_polls(&self, n: u32) {
        self.failing_polls.store(n, Ordering::SeqCst);
    }

    /// Block the next poll until the returned sender fires (or is dropped).
    pub fn hold_next_poll(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock().unwrap() = Some(rx);
        tx
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn poll_prices(
        &self,
        _accounts: &[(AssetId, OracleAccount)],
    ) -> Result<HashMap<AssetId, OraclePrice>> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        if self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LedgerError::Rpc("getMultipleAccounts failed".into()).into());
        }

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = next;
        }
        Ok(last.clone())
    }
}
