//! Outbound adapters (driven side).

#[cfg(feature = "solana")]
pub mod solana;
