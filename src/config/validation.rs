//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, port valid, jitter ratio)
//! - Check that URLs and socket addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{PollConfig, ServiceConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a loaded configuration for values serde cannot reject.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be non-zero"));
    }

    for (field, value) in [
        ("gcp.api_base_url", &config.gcp.api_base_url),
        ("gcp.metadata_url", &config.gcp.metadata_url),
    ] {
        if let Err(e) = url::Url::parse(value) {
            errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e)));
        }
    }
    if config.gcp.request_timeout_secs == 0 {
        errors.push(ValidationError::new("gcp.request_timeout_secs", "must be non-zero"));
    }
    if matches!(&config.gcp.project, Some(p) if p.trim().is_empty()) {
        errors.push(ValidationError::new("gcp.project", "must not be empty when set"));
    }

    check_poll(&mut errors, "provisioning.operation_poll", &config.provisioning.operation_poll);
    check_poll(&mut errors, "provisioning.readiness_poll", &config.provisioning.readiness_poll);

    let retry = &config.provisioning.mutation_retry;
    if retry.attempts == 0 {
        errors.push(ValidationError::new("provisioning.mutation_retry.attempts", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&retry.jitter_ratio) {
        errors.push(ValidationError::new(
            "provisioning.mutation_retry.jitter_ratio",
            "must be between 0.0 and 1.0",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_poll(errors: &mut Vec<ValidationError>, field: &str, poll: &PollConfig) {
    if poll.max_attempts == 0 {
        errors.push(ValidationError::new(&format!("{}.max_attempts", field), "must be at least 1"));
    }
}
