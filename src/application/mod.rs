//! Application services (use cases).
//!
//! These services hold the agent's in-memory state and drive the ports:
//!
//! - [`price_feed`] - Oracle polling with change detection
//! - [`position_store`] - Position mirror reconciled with a live subscription
//! - [`cache`] - Custody and liquidation price caches
//! - [`decision`] - Eligibility checks against fresh prices
//! - [`executor`] - Simulate-then-submit liquidation with an in-flight guard
//! - [`agent`] - The event loop tying them together
//! - [`retry`] - Bounded retry with jittered backoff

pub mod agent;
pub mod cache;
pub mod decision;
pub mod executor;
pub mod position_store;
pub mod price_feed;
pub mod retry;

pub use agent::{Agent, AgentEvent, AgentPorts, AgentSettings};
pub use decision::DecisionEngine;
pub use executor::{AttemptOutcome, ExecutorStats, LiquidationExecutor};
pub use position_store::PositionStore;
pub use price_feed::PriceFeed;
pub use retry::RetryPolicy;
