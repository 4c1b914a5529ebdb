//! Reactive mirror of the ledger's position accounts.
//!
//! Start-up has to reconcile a bulk load with a live subscription. The store
//! subscribes first so the subscription channel buffers every mutation
//! delivered while the bulk load runs. The snapshot then replaces the mirror,
//! and a tail task drains the channel, applying only updates at or after the
//! snapshot's cursor slot. Updates older than the cursor are already
//! reflected in (or superseded by) the snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::domain::{Position, PositionAddress, PositionSnapshot, PositionUpdate};
use crate::error::Result;
use crate::port::{PositionSource, SubscriptionHandle};

type PositionMap = Arc<RwLock<HashMap<PositionAddress, Position>>>;

struct Running {
    subscription: SubscriptionHandle,
    stop: watch::Sender<bool>,
    _tail: JoinHandle<()>,
}

/// Read-only mirror of every position account, keyed by address.
pub struct PositionStore {
    source: Arc<dyn PositionSource>,
    retry: RetryPolicy,
    positions: PositionMap,
    running: Option<Running>,
}

impl PositionStore {
    pub fn new(source: Arc<dyn PositionSource>, retry: RetryPolicy) -> Self {
        Self {
            source,
            retry,
            positions: Arc::new(RwLock::new(HashMap::new())),
            running: None,
        }
    }

    /// Subscribe to position mutations and load the current position set.
    ///
    /// `on_change` is invoked for every mutation applied after the snapshot,
    /// including buffered ones that raced the bulk load. Returns the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be opened or the bulk load
    /// keeps failing after retries. The store is left stopped and empty.
    pub async fn start<F>(&mut self, on_change: F) -> Result<PositionSnapshot>
    where
        F: Fn(PositionAddress, Position) + Send + Sync + 'static,
    {
        self.stop();

        let subscription = self.source.subscribe_positions().await?;
        let snapshot = match self
            .retry
            .run("load_all_positions", || self.source.load_all_positions())
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                subscription.handle.unsubscribe();
                return Err(e);
            }
        };

        *self.positions.write() = snapshot.positions.iter().cloned().collect();
        info!(
            positions = snapshot.positions.len(),
            slot = snapshot.slot,
            "Position snapshot loaded"
        );

        let (stop, stop_rx) = watch::channel(false);
        let tail = tokio::spawn(tail_updates(
            subscription.updates,
            snapshot.slot,
            self.positions.clone(),
            on_change,
            stop_rx,
        ));
        self.running = Some(Running {
            subscription: subscription.handle,
            stop,
            _tail: tail,
        });

        Ok(snapshot)
    }

    /// Unsubscribe and clear the mirror.
    ///
    /// The store can only be brought back to a consistent state by calling
    /// [`start`](Self::start) again.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(true);
            running.subscription.unsubscribe();
            info!("Position subscription closed");
        }
        self.positions.write().clear();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    #[must_use]
    pub fn get(&self, address: &PositionAddress) -> Option<Position> {
        self.positions.read().get(address).cloned()
    }

    /// Copy of every mirrored position.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(PositionAddress, Position)> {
        self.positions
            .read()
            .iter()
            .map(|(address, position)| (address.clone(), position.clone()))
            .collect()
    }

    /// Drop `address` from the mirror if it still holds `position`.
    ///
    /// The ledger does not announce closed position accounts, so the owner of
    /// the store removes them once it learns they are gone. A newer state for
    /// the same address (the account was reopened) is kept.
    pub fn remove_if_unchanged(&self, address: &PositionAddress, position: &Position) -> bool {
        let mut positions = self.positions.write();
        if positions.get(address) != Some(position) {
            return false;
        }
        positions.remove(address);
        debug!(position = %address, "Position dropped from mirror");
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}

impl Drop for PositionStore {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tail_updates<F>(
    mut updates: mpsc::Receiver<PositionUpdate>,
    cursor: u64,
    positions: PositionMap,
    on_change: F,
    mut stop: watch::Receiver<bool>,
) where
    F: Fn(PositionAddress, Position) + Send + Sync + 'static,
{
    loop {
        let update = tokio::select! {
            biased;
            _ = stop.changed() => break,
            update = updates.recv() => update,
        };
        let Some(update) = update else {
            warn!("Position subscription ended");
            break;
        };

        if update.slot < cursor {
            debug!(
                position = %update.address,
                slot = update.slot,
                cursor,
                "Dropping position update older than snapshot"
            );
            continue;
        }

        {
            let mut positions = positions.write();
            if *stop.borrow() {
                break;
            }
            positions.insert(update.address.clone(), update.position.clone());
        }
        debug!(position = %update.address, slot = update.slot, "Position changed");
        on_change(update.address, update.position);
    }
}
