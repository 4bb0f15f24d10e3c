//! Per-request attempt state machine
//!
//! A logical request moves through these states:
//!
//! ```text
//! Attempting(n) ──ok──────────────────────────────▶ Succeeded
//!      │
//!      └─err──▶ after_failure
//!                 ├─ 401, refresh allowed ─▶ Refreshing(n) ─ok──▶ Attempting(n)
//!                 │                                       └─err─▶ Failed(401)
//!                 ├─ not retryable ────────▶ Failed
//!                 ├─ budget spent ─────────▶ Failed
//!                 └─ otherwise ────────────▶ Retrying(n, delay) ─▶ Attempting(n + 1)
//! ```
//!
//! A refresh returns to the *same* attempt index, so renewing credentials
//! never consumes the retry budget.

use crate::error::ApiError;
use crate::request::ApiResponse;
use leadflow_core::retry::RetryPolicy;
use serde_json::Value;
use std::time::Duration;

/// Where a logical request currently is
#[derive(Debug)]
pub enum AttemptState {
    /// About to issue attempt `attempt` (0-based)
    Attempting {
        /// Attempt index
        attempt: u32,
    },
    /// Renewing credentials after `error` (a 401) on `attempt`
    Refreshing {
        /// Attempt index to resume at
        attempt: u32,
        /// The 401 that triggered the refresh
        error: ApiError,
    },
    /// Backing off before the next attempt
    Retrying {
        /// Index of the attempt that just failed
        attempt: u32,
        /// Sleep before the next attempt
        delay: Duration,
    },
    /// Terminal: the request succeeded
    Succeeded(ApiResponse<Value>),
    /// Terminal: the request failed
    Failed(ApiError),
}

/// Facts about the request needed to pick the next state after a failure
#[derive(Debug, Clone, Copy)]
pub struct FailureContext {
    /// Index of the attempt that failed
    pub attempt: u32,
    /// Retries allowed after the initial attempt
    pub max_retries: u32,
    /// Whether a token refresh may still be tried for this request
    pub can_refresh: bool,
}

/// Decide what follows a failed attempt.
#[must_use]
pub fn after_failure(error: ApiError, ctx: FailureContext, policy: &RetryPolicy) -> AttemptState {
    if error.is_unauthorized() && ctx.can_refresh {
        return AttemptState::Refreshing {
            attempt: ctx.attempt,
            error,
        };
    }

    if !error.is_retryable(policy) || ctx.attempt >= ctx.max_retries {
        return AttemptState::Failed(error);
    }

    AttemptState::Retrying {
        attempt: ctx.attempt,
        delay: policy.delay_for_attempt(ctx.attempt),
    }
}
