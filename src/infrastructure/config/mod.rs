//! Infrastructure configuration modules.

pub mod logging;
pub mod network;
pub mod oracle;
pub mod retry;
pub mod settings;
pub mod wallet;
