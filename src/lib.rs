//! perp-liquidator - an autonomous liquidator for leveraged perpetuals.
//!
//! The agent mirrors every open position of a perpetuals program, keeps the
//! latest oracle price per asset, asks the program for each position's
//! liquidation price and liquidates positions whose conservative mark price
//! has crossed it.
//!
//! # Architecture
//!
//! - [`domain`] - Positions, custodies, prices and liquidation price entries
//! - [`port`] - Ledger, oracle and submission traits
//! - [`application`] - Price feed, position store, caches, decision engine,
//!   executor and the agent event loop
//! - [`adapter`] - Solana RPC/pubsub and Pyth adapters, the CLI
//! - [`infrastructure`] - Configuration and wiring
//!
//! # Features
//!
//! - `solana` (default) - Solana and Pyth adapters
//! - `testkit` - In-memory ports and builders for integration tests

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
