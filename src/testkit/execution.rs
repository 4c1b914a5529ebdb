//! Recording [`LiquidationSubmitter`] for executor and agent tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::{LiquidationTarget, PositionAddress, TransactionId};
use crate::error::{ExecutionError, Result};
use crate::port::LiquidationSubmitter;

/// A submitter that records every simulation and submission.
///
/// Simulations succeed unless the position was marked with
/// [`reject`](Self::reject); submissions succeed unless
/// [`fail_submissions`](Self::fail_submissions) is set.
pub struct MockSubmitter {
    rejected: Mutex<HashSet<PositionAddress>>,
    closed: Mutex<HashSet<PositionAddress>>,
    fail_submissions: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
    simulations: AtomicU32,
    submitted: Mutex<Vec<PositionAddress>>,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self {
            rejected: Mutex::new(HashSet::new()),
            closed: Mutex::new(HashSet::new()),
            fail_submissions: AtomicBool::new(false),
            gate: Mutex::new(None),
            simulations: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Make simulations for `address` fail with a program error.
    pub fn reject(&self, address: PositionAddress) {
        self.rejected.lock().unwrap().insert(address);
    }

    /// Make simulations for `address` fail as for a closed position account.
    pub fn close(&self, address: PositionAddress) {
        self.closed.lock().unwrap().insert(address);
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    /// Hold every submission until the returned gate is notified once per submission.
    pub fn hold_submissions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn simulations(&self) -> u32 {
        self.simulations.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<PositionAddress> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Default for MockSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiquidationSubmitter for MockSubmitter {
    async fn simulate_liquidation(&self, target: &LiquidationTarget) -> Result<()> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        if self.closed.lock().unwrap().contains(&target.address) {
            return Err(ExecutionError::PositionClosed(
                "AnchorError caused by account: position. Error Code: AccountNotInitialized".into(),
            )
            .into());
        }
        if self.rejected.lock().unwrap().contains(&target.address) {
            return Err(ExecutionError::SimulationRejected(
                "custom program error: 0x1770".into(),
            )
            .into());
        }
        Ok(())
    }

    async fn submit_liquidation(&self, target: &LiquidationTarget) -> Result<TransactionId> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(ExecutionError::SubmissionFailed("blockhash not found".into()).into());
        }
        self.submitted.lock().unwrap().push(target.address.clone());
        Ok(TransactionId::new(format!("sig-{}", target.address)))
    }
}
