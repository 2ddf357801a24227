//! Retrying mutator.
//!
//! # Responsibilities
//! - Re-run a side-effecting action until it succeeds or the attempt budget runs out
//! - Sleep a fixed delay (optionally jittered) between attempts
//! - Propagate the error of the final attempt unchanged
//!
//! # Design Decisions
//! - Every error triggers a retry; there is no retryable/fatal split
//! - Callers must hand in actions that are safe to re-invoke
//! - No exponential growth: the delay is the same between every pair of attempts

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::fixed_delay;

/// Attempt budget and spacing for [`retry`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Delay between two attempts.
    pub delay: Duration,
    /// Extra random delay as a fraction of `delay` (0.0 disables jitter).
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    /// Flat policy without jitter.
    pub fn fixed(delay: Duration, attempts: u32) -> Self {
        Self {
            attempts,
            delay,
            jitter_ratio: 0.0,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts,
            delay: Duration::from_millis(config.delay_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }
}

/// Run `action` until it succeeds, at most `policy.attempts` times.
///
/// The closure receives the 1-based attempt number. A budget of zero still
/// runs the action once.
pub async fn retry<T, E, F, Fut>(label: &str, policy: &RetryPolicy, mut action: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        metrics::record_retry_attempt(label);

        match action(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                tracing::error!(action = label, attempt, error = %e, "Giving up after final attempt");
                return Err(e);
            }
            Err(e) => {
                let delay = fixed_delay(policy.delay, policy.jitter_ratio);
                tracing::warn!(action = label, attempt, delay = ?delay, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
