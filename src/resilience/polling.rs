//! Bounded polling of asynchronous provider work.
//!
//! # Responsibilities
//! - Poll a probe at a fixed interval until it reports a terminal state
//! - Tolerate failing probes within the same attempt budget
//! - Distinguish timeout, terminal failure and probe failure for callers
//!
//! # Design Decisions
//! - A terminal failure stops polling immediately; the rest of the budget is not used
//! - No sleep after the final attempt
//! - Polling is purely observational: the probe never re-issues the mutation

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::PollConfig;
use crate::observability::metrics;

/// What a single probe observed.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress<T> {
    /// Terminal success carrying the probed value.
    Ready(T),
    /// Still in flight; the string is a status label for logging.
    Pending(String),
    /// Terminal failure reported by the provider.
    Failed(String),
}

/// Attempt budget and interval for [`poll_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self { max_attempts, interval }
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: Duration::from_millis(config.interval_ms),
        }
    }
}

/// Why polling stopped without success.
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The budget ran out while the work was still pending.
    #[error("{what} did not complete after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },

    /// The provider reported the work as finished with errors.
    #[error("{what} completed with errors: {detail}")]
    Failed { what: String, detail: String },

    /// The probe itself failed on the last attempt.
    #[error("error polling {what}: {error}")]
    Fetch { what: String, error: E },
}

/// Status view of a long-running provider operation.
pub trait OperationStatus {
    /// The provider considers the operation finished.
    fn is_done(&self) -> bool;

    /// Error payload attached to a finished operation, if any.
    fn error_detail(&self) -> Option<String>;

    /// Raw status label, used only for logging.
    fn status_label(&self) -> &str;
}

/// Poll `probe` until it reports [`Progress::Ready`] or [`Progress::Failed`].
pub async fn poll_until<T, E, F, Fut>(
    what: &str,
    policy: &PollPolicy,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Progress<T>, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match probe().await {
            Ok(Progress::Ready(value)) => {
                tracing::debug!(what, attempt, "Polling finished");
                metrics::record_poll("ready");
                return Ok(value);
            }
            Ok(Progress::Failed(detail)) => {
                tracing::error!(what, attempt, detail = %detail, "Completed with errors");
                metrics::record_poll("failed");
                return Err(PollError::Failed {
                    what: what.to_string(),
                    detail,
                });
            }
            Ok(Progress::Pending(status)) => {
                tracing::debug!(what, attempt, status = %status, "Still in progress, waiting");
                metrics::record_poll("pending");
            }
            Err(e) => {
                tracing::warn!(what, attempt, error = %e, "Error checking status");
                metrics::record_poll("error");
                if attempt == max_attempts {
                    return Err(PollError::Fetch {
                        what: what.to_string(),
                        error: e,
                    });
                }
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    metrics::record_poll("timeout");
    Err(PollError::Timeout {
        what: what.to_string(),
        attempts: max_attempts,
    })
}

/// Wait for a long-running operation to reach DONE without errors.
///
/// `fetch` returns the current state of the operation; it is called at most
/// `policy.max_attempts` times. The final snapshot is returned on success.
pub async fn await_completion<S, E, F, Fut>(
    what: &str,
    policy: &PollPolicy,
    mut fetch: F,
) -> Result<S, PollError<E>>
where
    S: OperationStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
    E: Display,
{
    poll_until(what, policy, || {
        let pending = fetch();
        async move {
            let op = match pending.await {
                Ok(op) => op,
                Err(e) => return Err(e),
            };
            if !op.is_done() {
                return Ok(Progress::Pending(op.status_label().to_string()));
            }
            match op.error_detail() {
                Some(detail) => Ok(Progress::Failed(detail)),
                None => Ok(Progress::Ready(op)),
            }
        }
    })
    .await
}
