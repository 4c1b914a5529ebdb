//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use crate::application::retry::RetryPolicy;
use crate::infrastructure::config::retry::RetryConfig;

/// Retry config with zero delays and the given attempt bound.
pub fn retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 0,
        max_delay_ms: 0,
        backoff_multiplier: 1.0,
    }
}

/// Retry policy with zero delays, three attempts.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(retry(3))
}
