//! Retry policy with exponential backoff
//!
//! Describes *when* a failed call may be attempted again and *how long* to
//! wait before doing so:
//! - Exponential backoff: `base_delay * 2^attempt`
//! - Status-code based eligibility (`retry_status_codes`)
//! - Status `0` (network failure) is always eligible
//!
//! # Example
//!
//! ```rust
//! use leadflow_core::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
//! assert!(policy.is_retryable_status(503));
//! assert!(!policy.is_retryable_status(404));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Default number of retries after the initial attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries, in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Status codes that are retried by default
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Upper bound on the backoff exponent
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further one
    #[serde(with = "crate::duration_ms")]
    pub base_delay: Duration,
    /// HTTP statuses considered transient
    pub retry_status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy for quick retries (tests, local development)
    #[must_use]
    pub fn quick() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            ..Self::default()
        }
    }

    /// Create a policy with no retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay to sleep after the failed attempt with index `attempt` (0-based).
    ///
    /// `base_delay * 2^attempt`; the exponent stops growing past 16 and the
    /// product saturates.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u32 << attempt.min(MAX_BACKOFF_SHIFT);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Whether a failure with this status may be retried.
    ///
    /// Status `0` is the network-error convention and is always transient.
    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        status == 0 || self.retry_status_codes.contains(&status)
    }
}
