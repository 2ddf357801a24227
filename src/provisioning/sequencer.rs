//! Provisioning sequencer.
//!
//! # Stages
//! ```text
//! 1. resolve certificate      list → reuse, or insert + await operation
//! 2. await backend readiness  get by name, bounded poll
//! 3. locate backend service   list, match by name           (404 if absent)
//! 4. attach to backend        retry(get fingerprint, patch) + await operation
//! 5. update URL map           match defaultService (404 if absent),
//!                             retry(add host, patch) + await operation
//! 6. attach to HTTPS proxy    retry(get fingerprint, patch) + await operation
//! ```
//!
//! Every stage is gated on the previous one. A failure short-circuits the
//! flow and nothing already applied is rolled back; re-running the whole flow
//! converges because every stage checks before it mutates.

use serde_json::Map;
use std::sync::Arc;

use crate::compute::types::{contains_resource, same_resource};
use crate::compute::{
    BackendService, BackendServicePatch, ComputeApi, ComputeError, HostRule, Operation, PathMatcher,
    SslCertificate, TargetHttpsProxy, TargetHttpsProxyPatch, UrlMap, UrlMapPatch,
};
use crate::config::ProvisioningConfig;
use crate::provisioning::error::{ProvisionError, ProvisionResult};
use crate::resilience::{await_completion, poll_until, retry, PollError, PollPolicy, Progress, RetryPolicy};

/// Maximum length of a Compute resource name.
const MAX_NAME_LEN: usize = 63;

/// Validated input of one provisioning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub domain: String,
    pub load_balancer_name: String,
}

/// What the flow changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Self link of the certificate now serving the domain.
    pub certificate: String,
    pub certificate_created: bool,
    pub backend_patched: bool,
    pub url_map_updated: bool,
    pub proxy_patched: bool,
}

/// Runs the six provisioning stages against a Compute API.
#[derive(Clone)]
pub struct Provisioner {
    compute: Arc<dyn ComputeApi>,
    operation_poll: PollPolicy,
    readiness_poll: PollPolicy,
    mutation_retry: RetryPolicy,
}

impl Provisioner {
    pub fn new(compute: Arc<dyn ComputeApi>, config: &ProvisioningConfig) -> Self {
        Self {
            compute,
            operation_poll: PollPolicy::from(&config.operation_poll),
            readiness_poll: PollPolicy::from(&config.readiness_poll),
            mutation_retry: RetryPolicy::from(&config.mutation_retry),
        }
    }

    /// Provision a certificate for `request.domain` and attach it to the
    /// load balancer fronting `request.load_balancer_name`.
    #[tracing::instrument(
        name = "provision",
        skip_all,
        fields(
            project = %self.compute.project(),
            domain = %request.domain,
            load_balancer = %request.load_balancer_name
        )
    )]
    pub async fn provision(&self, request: &ProvisionRequest) -> ProvisionResult<ProvisionReport> {
        let mut report = ProvisionReport::default();

        let (certificate, created) = self.resolve_certificate(&request.domain).await?;
        report.certificate = certificate.clone();
        report.certificate_created = created;

        self.await_backend_ready(&request.load_balancer_name).await?;

        let backend = self.find_backend_service(&request.load_balancer_name).await?;
        report.backend_patched = self.attach_to_backend(&backend, &certificate).await?;

        let backend_link = backend
            .self_link
            .clone()
            .unwrap_or_else(|| self.compute.resource_link("backendServices", &backend.name));

        let url_map = self.find_url_map(&backend_link).await?;
        report.url_map_updated = self
            .update_url_map(&url_map, &request.domain, &backend_link, &request.load_balancer_name)
            .await?;

        let url_map_link = url_map
            .self_link
            .clone()
            .unwrap_or_else(|| self.compute.resource_link("urlMaps", &url_map.name));

        let proxy = self.find_proxy(&url_map_link).await?;
        report.proxy_patched = self.attach_to_proxy(&proxy, &certificate).await?;

        tracing::info!(
            certificate = %report.certificate,
            certificate_created = report.certificate_created,
            backend_patched = report.backend_patched,
            url_map_updated = report.url_map_updated,
            proxy_patched = report.proxy_patched,
            "Domain configured successfully"
        );
        Ok(report)
    }

    /// Stage 1: reuse a managed certificate covering the domain, or create one.
    async fn resolve_certificate(&self, domain: &str) -> ProvisionResult<(String, bool)> {
        let existing = self.compute.list_ssl_certificates().await?;

        if let Some(cert) = existing.iter().find(|c| c.covers(domain)) {
            tracing::info!(certificate = %cert.name, "Existing certificate found");
            let link = cert
                .self_link
                .clone()
                .unwrap_or_else(|| self.compute.resource_link("sslCertificates", &cert.name));
            return Ok((link, false));
        }

        let name = certificate_name(domain);
        tracing::info!(certificate = %name, "Creating managed certificate");
        let op = self
            .compute
            .insert_ssl_certificate(&SslCertificate::managed(&name, domain))
            .await?;
        let done = self.wait_for_operation(op).await?;

        let link = done
            .target_link
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.compute.resource_link("sslCertificates", &name));
        tracing::info!(certificate = %name, link = %link, "New certificate created");
        Ok((link, true))
    }

    /// Stage 2: wait until the backend service exists.
    async fn await_backend_ready(&self, name: &str) -> ProvisionResult<()> {
        let what = format!("backend service {}", name);
        let compute = &self.compute;

        let result = poll_until(&what, &self.readiness_poll, || async move {
            match compute.get_backend_service(name).await {
                Ok(service) if !service.name.is_empty() => Ok(Progress::Ready(())),
                Ok(_) => Ok(Progress::Pending("unnamed".to_string())),
                Err(e) if e.is_not_found() => Ok(Progress::Pending("not found".to_string())),
                Err(e) => Err(e),
            }
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!(backend_service = %name, "Backend service is ready");
                Ok(())
            }
            Err(PollError::Timeout { attempts, .. }) => {
                tracing::warn!(backend_service = %name, attempts, "Backend service never appeared");
                Err(ProvisionError::NotFound("Load balancer not found.".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage 3.
    async fn find_backend_service(&self, name: &str) -> ProvisionResult<BackendService> {
        let services = self.compute.list_backend_services().await?;
        let service = services
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ProvisionError::NotFound("Load balancer not found.".to_string()))?;
        tracing::info!(backend_service = %service.name, "Backend service found, checking certificates");
        Ok(service)
    }

    /// Stage 4. Returns whether a patch was applied.
    ///
    /// Same compare-and-swap shape as the proxy stage: every attempt re-reads
    /// the service and patches with its fingerprint, so a concurrent attach
    /// is never overwritten.
    async fn attach_to_backend(&self, backend: &BackendService, certificate: &str) -> ProvisionResult<bool> {
        if contains_resource(&backend.ssl_certificates, certificate) {
            tracing::info!(backend_service = %backend.name, "Backend service already has the certificate");
            return Ok(false);
        }

        let name = backend.name.as_str();
        let compute = &self.compute;

        let op = retry("patch_backend_service", &self.mutation_retry, |attempt| async move {
            let current = compute.get_backend_service(name).await?;
            if contains_resource(&current.ssl_certificates, certificate) {
                tracing::info!(backend_service = %name, attempt, "Certificate attached concurrently, nothing to patch");
                return Ok::<Option<Operation>, ComputeError>(None);
            }

            let mut certificates = current.ssl_certificates;
            certificates.push(certificate.to_string());
            tracing::info!(backend_service = %name, attempt, "Patching backend service with certificate");
            let op = compute
                .patch_backend_service(
                    name,
                    &BackendServicePatch {
                        name: name.to_string(),
                        ssl_certificates: certificates,
                        fingerprint: current.fingerprint,
                    },
                )
                .await?;
            Ok(Some(op))
        })
        .await?;

        self.await_patch(op).await
    }

    /// Stage 5a.
    async fn find_url_map(&self, backend_link: &str) -> ProvisionResult<UrlMap> {
        let maps = self.compute.list_url_maps().await?;
        let map = maps
            .into_iter()
            .find(|m| m.default_service.as_deref().is_some_and(|s| same_resource(s, backend_link)))
            .ok_or_else(|| ProvisionError::NotFound("URL map not found.".to_string()))?;
        tracing::info!(url_map = %map.name, "URL map found, checking host rules");
        Ok(map)
    }

    /// Stage 5b. Returns whether the map was patched.
    ///
    /// The first attempt patches the map as listed in stage 5a; later
    /// attempts re-list it so a fingerprint conflict is resolved against the
    /// current rules.
    async fn update_url_map(
        &self,
        map: &UrlMap,
        domain: &str,
        backend_link: &str,
        load_balancer_name: &str,
    ) -> ProvisionResult<bool> {
        let compute = &self.compute;

        let op = retry("patch_url_map", &self.mutation_retry, |attempt| async move {
            let mut current = if attempt == 1 {
                map.clone()
            } else {
                compute
                    .list_url_maps()
                    .await?
                    .into_iter()
                    .find(|m| m.name == map.name)
                    .ok_or_else(|| ComputeError::NotFound(format!("URL map {}", map.name)))?
            };

            if !add_domain_to_host_rules(&mut current, domain, backend_link, load_balancer_name) {
                tracing::info!(url_map = %current.name, attempt, "URL map already includes the domain");
                return Ok::<Option<Operation>, ComputeError>(None);
            }

            tracing::info!(url_map = %current.name, attempt, "Updating URL map with new domain");
            let op = compute
                .patch_url_map(
                    &current.name,
                    &UrlMapPatch {
                        host_rules: current.host_rules,
                        path_matchers: current.path_matchers,
                        fingerprint: current.fingerprint,
                    },
                )
                .await?;
            Ok(Some(op))
        })
        .await?;

        self.await_patch(op).await
    }

    /// Stage 6a.
    async fn find_proxy(&self, url_map_link: &str) -> ProvisionResult<TargetHttpsProxy> {
        let proxies = self.compute.list_target_https_proxies().await?;
        let proxy = proxies
            .into_iter()
            .find(|p| p.url_map.as_deref().is_some_and(|m| same_resource(m, url_map_link)))
            .ok_or_else(|| ProvisionError::NotFound("Target HTTPS proxy not found.".to_string()))?;
        tracing::info!(proxy = %proxy.name, "Target HTTPS proxy found, checking certificates");
        Ok(proxy)
    }

    /// Stage 6b. Returns whether a patch was applied.
    ///
    /// Each attempt re-reads the proxy so the patch always carries the
    /// current fingerprint and certificate list. A fingerprint conflict from
    /// a concurrent edit fails that attempt and the next one starts from the
    /// fresh state.
    async fn attach_to_proxy(&self, proxy: &TargetHttpsProxy, certificate: &str) -> ProvisionResult<bool> {
        if contains_resource(&proxy.ssl_certificates, certificate) {
            tracing::info!(proxy = %proxy.name, "Target HTTPS proxy already has the certificate");
            return Ok(false);
        }

        let name = proxy.name.as_str();
        let compute = &self.compute;

        let op = retry("patch_target_https_proxy", &self.mutation_retry, |attempt| async move {
            let current = compute.get_target_https_proxy(name).await?;
            if contains_resource(&current.ssl_certificates, certificate) {
                tracing::info!(proxy = %name, attempt, "Certificate attached concurrently, nothing to patch");
                return Ok::<Option<Operation>, ComputeError>(None);
            }

            let mut certificates = current.ssl_certificates;
            certificates.push(certificate.to_string());
            tracing::info!(
                proxy = %name,
                attempt,
                fingerprint = current.fingerprint.as_deref().unwrap_or(""),
                "Patching target HTTPS proxy with certificate"
            );
            let op = compute
                .patch_target_https_proxy(
                    name,
                    &TargetHttpsProxyPatch {
                        ssl_certificates: certificates,
                        fingerprint: current.fingerprint,
                    },
                )
                .await?;
            Ok(Some(op))
        })
        .await?;

        self.await_patch(op).await
    }

    /// Wait for a patch issued by a retried stage. `None` means nothing was patched.
    async fn await_patch(&self, op: Option<Operation>) -> ProvisionResult<bool> {
        match op {
            Some(op) => {
                self.wait_for_operation(op).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Poll a global operation until it is DONE without errors.
    async fn wait_for_operation(&self, op: Operation) -> ProvisionResult<Operation> {
        let what = format!("operation {}", op.name);
        let name = op.name.as_str();
        let compute = &self.compute;

        let done = await_completion(&what, &self.operation_poll, || compute.get_global_operation(name)).await?;
        tracing::info!(operation = %done.name, "Operation is complete");
        Ok(done)
    }
}

/// Resource name for a domain's managed certificate: `cert-` followed by the
/// domain with every character outside `[a-z0-9-]` replaced by `-`.
pub fn certificate_name(domain: &str) -> String {
    let mut name = String::from("cert-");
    name.extend(domain.trim().chars().map(|c| {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            c
        } else {
            '-'
        }
    }));
    trim_name(name)
}

fn trim_name(mut name: String) -> String {
    name.truncate(MAX_NAME_LEN);
    while name.ends_with('-') {
        name.pop();
    }
    name
}

/// Make every host rule of `map` match `domain`. Returns whether `map` changed.
///
/// A map without host rules gets one, routed to its first path matcher or to
/// a new matcher defaulting to the backend service.
pub fn add_domain_to_host_rules(map: &mut UrlMap, domain: &str, backend_link: &str, load_balancer_name: &str) -> bool {
    if map.host_rules.is_empty() {
        let matcher = match map.path_matchers.first() {
            Some(existing) => existing.name.clone(),
            None => {
                let name = trim_name(format!("{}-matcher", load_balancer_name));
                map.path_matchers.push(PathMatcher {
                    name: name.clone(),
                    default_service: Some(backend_link.to_string()),
                    extra: Map::new(),
                });
                name
            }
        };
        map.host_rules.push(HostRule {
            hosts: vec![domain.to_string()],
            path_matcher: matcher,
            extra: Map::new(),
        });
        return true;
    }

    let mut changed = false;
    for rule in &mut map.host_rules {
        if !rule.hosts.iter().any(|h| h == domain) {
            rule.hosts.push(domain.to_string());
            changed = true;
        }
    }
    changed
}
