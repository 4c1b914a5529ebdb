//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!     ┌──────────────┤  Domain + Port          ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌─────────────┐
//! │ Ledger  │            │   Oracle    │              │ Liquidation │
//! │ Adapter │            │   Adapter   │              │   Adapter   │
//! └─────────┘            └─────────────┘              └─────────────┘
//! ```

pub mod outbound;

pub use outbound::ledger::{
    CustodySource, LiquidationPriceView, PositionSource, PositionSubscription, SubscriptionHandle,
};
pub use outbound::liquidation::LiquidationSubmitter;
pub use outbound::oracle::PriceOracle;
