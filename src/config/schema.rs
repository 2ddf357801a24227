//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the certificate provisioner.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind host, port, body limit).
    pub listener: ListenerConfig,

    /// Compute API access.
    pub gcp: GcpConfig,

    /// Retry and polling budgets for the provisioning flow.
    pub provisioning: ProvisioningConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port. Overridden by the `PORT` environment variable.
    pub port: u16,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Compute Engine API access.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GcpConfig {
    /// Project id. When unset it is read from the metadata server.
    pub project: Option<String>,

    /// Base URL of the Compute v1 REST API.
    pub api_base_url: String,

    /// Base URL of the instance metadata server.
    pub metadata_url: String,

    /// Static bearer token. When unset tokens come from the metadata server.
    pub access_token: Option<String>,

    /// Per-call timeout for Compute API requests in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project: None,
            api_base_url: "https://compute.googleapis.com/compute/v1".to_string(),
            metadata_url: "http://metadata.google.internal/computeMetadata/v1".to_string(),
            access_token: None,
            request_timeout_secs: 30,
        }
    }
}

/// Budgets for the provisioning flow.
///
/// The two poll sections default differently, so a partial section is filled
/// from its own defaults rather than from `PollConfig::default()`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Polling of long-running operations.
    #[serde(deserialize_with = "operation_poll")]
    pub operation_poll: PollConfig,

    /// Polling for the backend service to exist.
    #[serde(deserialize_with = "readiness_poll")]
    pub readiness_poll: PollConfig,

    /// Re-attempts of certificate attach patches.
    pub mutation_retry: RetryConfig,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            operation_poll: PollConfig::operation(),
            readiness_poll: PollConfig::readiness(),
            mutation_retry: RetryConfig::default(),
        }
    }
}

/// Bounded fixed-interval polling.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    /// Number of status checks before giving up.
    pub max_attempts: u32,

    /// Delay between checks in milliseconds.
    pub interval_ms: u64,
}

impl PollConfig {
    /// Defaults for long-running operation polls.
    pub fn operation() -> Self {
        Self {
            max_attempts: 10,
            interval_ms: 5000,
        }
    }

    /// Defaults for the backend readiness poll.
    pub fn readiness() -> Self {
        Self {
            max_attempts: 5,
            interval_ms: 10_000,
        }
    }

    fn overlay(self, section: PollSection) -> Self {
        Self {
            max_attempts: section.max_attempts.unwrap_or(self.max_attempts),
            interval_ms: section.interval_ms.unwrap_or(self.interval_ms),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::operation()
    }
}

/// A poll section as written in the file; absent keys keep their defaults.
#[derive(Deserialize)]
struct PollSection {
    max_attempts: Option<u32>,
    interval_ms: Option<u64>,
}

fn operation_poll<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PollConfig, D::Error> {
    PollSection::deserialize(deserializer).map(|section| PollConfig::operation().overlay(section))
}

fn readiness_poll<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PollConfig, D::Error> {
    PollSection::deserialize(deserializer).map(|section| PollConfig::readiness().overlay(section))
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub attempts: u32,

    /// Delay between attempts in milliseconds.
    pub delay_ms: u64,

    /// Random extra delay as a fraction of `delay_ms` (0.0 = none).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 5000,
            jitter_ratio: 0.0,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Default filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Address of the metrics listener.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_filter: "lb_cert_provisioner=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
