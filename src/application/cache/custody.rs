//! Thread-safe, append-only custody cache.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{Custody, CustodyAddress};
use crate::error::Result;
use crate::port::CustodySource;

/// Custody records keyed by custody address.
///
/// Loaded in bulk at startup and extended lazily when a position references a
/// custody the cache has not seen. Entries are never replaced or evicted.
#[derive(Default)]
pub struct CustodyCache {
    custodies: RwLock<HashMap<CustodyAddress, Custody>>,
}

impl CustodyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache from a bulk load.
    #[must_use]
    pub fn from_entries(entries: Vec<(CustodyAddress, Custody)>) -> Self {
        Self {
            custodies: RwLock::new(entries.into_iter().collect()),
        }
    }

    #[must_use]
    pub fn get(&self, address: &CustodyAddress) -> Option<Custody> {
        self.custodies.read().get(address).cloned()
    }

    /// Insert a custody unless one is already cached, returning the cached record.
    pub fn insert(&self, address: CustodyAddress, custody: Custody) -> Custody {
        self.custodies
            .write()
            .entry(address)
            .or_insert(custody)
            .clone()
    }

    /// Resolve a custody from the cache, fetching and caching it on a miss.
    ///
    /// `Ok(None)` means the custody does not exist on the ledger.
    pub async fn resolve(
        &self,
        source: &dyn CustodySource,
        address: &CustodyAddress,
    ) -> Result<Option<Custody>> {
        if let Some(custody) = self.get(address) {
            return Ok(Some(custody));
        }

        debug!(custody = %address, "Custody not cached, fetching");
        match source.fetch_custody(address).await? {
            Some(custody) => {
                info!(custody = %address, mint = %custody.mint, "Loaded custody");
                Ok(Some(self.insert(address.clone(), custody)))
            }
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.custodies.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.custodies.read().is_empty()
    }
}
