//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! business logic.
//!
//! - [`config`] - Configuration loading and validation
//! - [`bootstrap`] - Composition root for runtime wiring

#[cfg(feature = "solana")]
pub mod bootstrap;
pub mod config;
