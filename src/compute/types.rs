//! Compute Engine resource types and error definitions.
//!
//! Field names follow the v1 REST representation (camelCase on the wire).
//! Host rules and path matchers keep any fields this service does not model
//! so that a patch round-trips them unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::resilience::OperationStatus;

/// Errors that can occur talking to the Compute API.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A fingerprint precondition failed (HTTP 412).
    #[error("Precondition failed: {0}")]
    Conflict(String),

    /// Any other non-success response.
    #[error("Compute API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Connection, TLS or timeout failure.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Credentials could not be obtained.
    #[error("Auth error: {0}")]
    Auth(String),
}

impl ComputeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ComputeError::NotFound(_))
    }
}

/// Result type for Compute API calls.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// One page of a list response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error envelope: `{"error": {"code": 404, "message": "..."}}`.
///
/// Only the message is kept; the status line already carries the code.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

/// SSL certificate resource.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed: Option<ManagedCertificate>,
}

/// Provider-managed issuance settings of a certificate.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCertificate {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl SslCertificate {
    /// Insert body for a managed certificate covering one domain.
    pub fn managed(name: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            self_link: None,
            kind: Some("MANAGED".to_string()),
            managed: Some(ManagedCertificate {
                domains: vec![domain.to_string()],
                status: None,
            }),
        }
    }

    /// True when this is a managed certificate listing `domain`.
    pub fn covers(&self, domain: &str) -> bool {
        self.managed
            .as_ref()
            .map(|m| m.domains.iter().any(|d| d == domain))
            .unwrap_or(false)
    }
}

/// Backend service resource (only the fields this service touches).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendService {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default)]
    pub ssl_certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// PATCH body attaching certificates to a backend service, guarded by its fingerprint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendServicePatch {
    pub name: String,
    pub ssl_certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// URL map resource.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlMap {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_service: Option<String>,
    #[serde(default)]
    pub host_rules: Vec<HostRule>,
    #[serde(default)]
    pub path_matchers: Vec<PathMatcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostRule {
    #[serde(default)]
    pub hosts: Vec<String>,
    pub path_matcher: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathMatcher {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_service: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// PATCH body replacing the routing rules of a URL map.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlMapPatch {
    pub host_rules: Vec<HostRule>,
    pub path_matchers: Vec<PathMatcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Target HTTPS proxy resource.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetHttpsProxy {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_map: Option<String>,
    #[serde(default)]
    pub ssl_certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// PATCH body attaching certificates to a proxy, guarded by its fingerprint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetHttpsProxyPatch {
    pub ssl_certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Lifecycle state of a long-running operation.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    #[default]
    Pending,
    Running,
    Done,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "PENDING",
            OperationState::Running => "RUNNING",
            OperationState::Done => "DONE",
        }
    }
}

/// Long-running operation handle returned by every mutation.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub status: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationErrors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OperationErrorItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OperationStatus for Operation {
    fn is_done(&self) -> bool {
        self.status == OperationState::Done
    }

    fn error_detail(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        if error.errors.is_empty() {
            return Some("unspecified operation error".to_string());
        }
        let parts: Vec<String> = error
            .errors
            .iter()
            .map(|e| match (&e.code, &e.message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (Some(code), None) => code.clone(),
                (None, Some(message)) => message.clone(),
                (None, None) => "unknown".to_string(),
            })
            .collect();
        Some(parts.join("; "))
    }

    fn status_label(&self) -> &str {
        self.status.as_str()
    }
}

/// Compare two resource links by their `projects/...` suffix.
///
/// Full URLs and project-relative paths naming the same resource compare equal.
pub fn same_resource(a: &str, b: &str) -> bool {
    fn key(link: &str) -> &str {
        let link = link.trim_end_matches('/');
        match link.find("projects/") {
            Some(idx) => &link[idx..],
            None => link,
        }
    }
    key(a) == key(b)
}

/// True when `links` already contains a link to the same resource as `link`.
pub fn contains_resource(links: &[String], link: &str) -> bool {
    links.iter().any(|l| same_resource(l, link))
}
