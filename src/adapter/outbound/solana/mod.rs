//! Solana adapters for the perpetuals program and Pyth price accounts.
//!
//! - [`account`] - Anchor account codecs for positions and custodies
//! - [`instruction`] - PDAs and instruction assembly
//! - [`subscription`] - Live position account stream over pubsub
//! - [`client`] - RPC client implementing the ledger and liquidation ports
//! - [`pyth`] - Pyth price account oracle

pub mod account;
pub mod client;
pub mod instruction;
pub mod pyth;
pub mod subscription;

pub use client::SolanaClient;
pub use pyth::PythOracle;
