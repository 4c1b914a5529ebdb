//! Ledger ports: position and custody accounts, and the liquidation price view.
//!
//! These are the primary integration points with the perpetuals program.
//! Implementations own connection setup, account decoding and address
//! derivation; the application layer only sees domain types.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};

use crate::domain::{
    Custody, CustodyAddress, Position, PositionAddress, PositionSnapshot, PositionUpdate,
};
use crate::error::Error;

/// Handle that keeps a live subscription open.
///
/// Dropping the handle ends the subscription as well; [`unsubscribe`](Self::unsubscribe)
/// makes it explicit.
#[derive(Debug)]
pub struct SubscriptionHandle {
    stop: watch::Sender<bool>,
}

impl SubscriptionHandle {
    /// Create a handle and the receiver the subscription task watches.
    #[must_use]
    pub fn channel() -> (Self, watch::Receiver<bool>) {
        let (stop, rx) = watch::channel(false);
        (Self { stop }, rx)
    }

    /// End the subscription.
    pub fn unsubscribe(self) {
        let _ = self.stop.send(true);
    }
}

/// A live stream of position mutations.
#[derive(Debug)]
pub struct PositionSubscription {
    /// Mutations in delivery order. Closed when the subscription ends.
    pub updates: mpsc::Receiver<PositionUpdate>,
    pub handle: SubscriptionHandle,
}

/// Source of position accounts.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Load every position account, tagged with a cursor slot.
    async fn load_all_positions(&self) -> Result<PositionSnapshot, Error>;

    /// Subscribe to mutations of position accounts.
    ///
    /// Returns once the subscription is established; updates delivered after
    /// that point are buffered in the returned channel.
    async fn subscribe_positions(&self) -> Result<PositionSubscription, Error>;
}

/// Source of custody accounts.
#[async_trait]
pub trait CustodySource: Send + Sync {
    /// Load every custody account.
    async fn load_all_custodies(&self) -> Result<Vec<(CustodyAddress, Custody)>, Error>;

    /// Fetch one custody account. `Ok(None)` means it does not exist.
    async fn fetch_custody(&self, address: &CustodyAddress) -> Result<Option<Custody>, Error>;
}

/// Read-only view call computing a position's liquidation price.
#[async_trait]
pub trait LiquidationPriceView: Send + Sync {
    /// Compute the liquidation price, or `None` if the ledger reports none.
    async fn liquidation_price(
        &self,
        address: &PositionAddress,
        position: &Position,
        custody: &Custody,
    ) -> Result<Option<Decimal>, Error>;
}
