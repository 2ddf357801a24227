//! Compute Engine integration subsystem.
//!
//! # Data Flow
//! ```text
//! Config / environment (project, token) or metadata server
//!     → auth.rs (bearer tokens, project id)
//!     → client.rs (REST calls with per-call timeout)
//!     → types.rs (typed resources, operations, errors)
//! ```
//!
//! # Security Constraints
//! - Credentials never appear in logs
//! - Every call carries a timeout
//! - Resources are fetched fresh per request, never cached

pub mod auth;
pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::GceClient;
pub use types::{
    BackendService, BackendServicePatch, ComputeError, ComputeResult, HostRule, Operation,
    OperationState, PathMatcher, SslCertificate, TargetHttpsProxy, TargetHttpsProxyPatch, UrlMap,
    UrlMapPatch,
};

/// Global-scope Compute operations used by the provisioning flow.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Project every call is scoped to.
    fn project(&self) -> &str;

    /// Canonical self link of a global resource, e.g. `("sslCertificates", "cert-a")`.
    fn resource_link(&self, collection: &str, name: &str) -> String;

    async fn list_ssl_certificates(&self) -> ComputeResult<Vec<SslCertificate>>;

    async fn insert_ssl_certificate(&self, certificate: &SslCertificate) -> ComputeResult<Operation>;

    async fn list_backend_services(&self) -> ComputeResult<Vec<BackendService>>;

    async fn get_backend_service(&self, name: &str) -> ComputeResult<BackendService>;

    async fn patch_backend_service(&self, name: &str, patch: &BackendServicePatch) -> ComputeResult<Operation>;

    async fn list_url_maps(&self) -> ComputeResult<Vec<UrlMap>>;

    async fn patch_url_map(&self, name: &str, patch: &UrlMapPatch) -> ComputeResult<Operation>;

    async fn list_target_https_proxies(&self) -> ComputeResult<Vec<TargetHttpsProxy>>;

    async fn get_target_https_proxy(&self, name: &str) -> ComputeResult<TargetHttpsProxy>;

    async fn patch_target_https_proxy(&self, name: &str, patch: &TargetHttpsProxyPatch) -> ComputeResult<Operation>;

    async fn get_global_operation(&self, name: &str) -> ComputeResult<Operation>;
}
