//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`ledger`] - `MockLedger` (positions, custodies, live subscription) and
//!   `MockLiquidationView` (fixed or deferred view call answers).
//! - [`oracle`] - `MockOracle` with scripted and holdable polls.
//! - [`execution`] - `MockSubmitter` recording simulations and submissions.
//! - [`domain`] - Builders for positions, custodies, updates, observations.
//! - [`config`] - Canonical test configurations.

pub mod config;
pub mod domain;
pub mod execution;
pub mod ledger;
pub mod oracle;
