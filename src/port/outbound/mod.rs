//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the ledger, oracle and transaction collaborators
//! the agent depends on.

pub mod ledger;
pub mod liquidation;
pub mod oracle;
