//! Error kinds surfaced by the provisioning flow.

use thiserror::Error;

use crate::compute::ComputeError;
use crate::resilience::PollError;

/// Why a provisioning request did not complete.
///
/// `Validation` and `NotFound` are caller-facing; every other variant is an
/// operational failure.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Required input missing or empty.
    #[error("{0}")]
    Validation(String),

    /// A load-balancer component referenced by the request does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The Compute API rejected or failed a call.
    #[error(transparent)]
    Compute(#[from] ComputeError),

    /// A long-running operation finished with errors.
    #[error("{what} completed with errors: {detail}")]
    OperationFailed { what: String, detail: String },

    /// A poll budget ran out before the work completed.
    #[error("{what} did not complete after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },
}

impl ProvisionError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::Validation(_) => "validation",
            ProvisionError::NotFound(_) => "not_found",
            ProvisionError::Compute(_) => "compute",
            ProvisionError::OperationFailed { .. } => "operation_failed",
            ProvisionError::Timeout { .. } => "timeout",
        }
    }
}

impl From<PollError<ComputeError>> for ProvisionError {
    fn from(err: PollError<ComputeError>) -> Self {
        match err {
            PollError::Timeout { what, attempts } => ProvisionError::Timeout { what, attempts },
            PollError::Failed { what, detail } => ProvisionError::OperationFailed { what, detail },
            PollError::Fetch { error, .. } => ProvisionError::Compute(error),
        }
    }
}

/// Result type for provisioning.
pub type ProvisionResult<T> = Result<T, ProvisionError>;
