//! In-memory caches owned by the agent.

pub mod custody;
pub mod liquidation;

pub use custody::CustodyCache;
pub use liquidation::{CacheStats, LiquidationPriceCache};
