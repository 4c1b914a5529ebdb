//! Oracle port for batched price polling.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{AssetId, OracleAccount, OraclePrice};
use crate::error::Error;

/// Polls oracle price accounts.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetch every listed price account in one round-trip.
    ///
    /// Assets whose account is missing or not currently trading are left out
    /// of the result rather than failing the whole batch.
    async fn poll_prices(
        &self,
        accounts: &[(AssetId, OracleAccount)],
    ) -> Result<HashMap<AssetId, OraclePrice>, Error>;
}
