//! Shared utilities for integration testing.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use lb_cert_provisioner::compute::{
    BackendService, BackendServicePatch, ComputeApi, ComputeError, ComputeResult, HostRule, Operation,
    OperationState, PathMatcher, SslCertificate, TargetHttpsProxy, TargetHttpsProxyPatch, UrlMap,
    UrlMapPatch,
};
use lb_cert_provisioner::compute::types::{OperationErrorItem, OperationErrors};
use lb_cert_provisioner::config::{PollConfig, ProvisioningConfig, RetryConfig, ServiceConfig};
use lb_cert_provisioner::{HttpServer, Shutdown};

pub const PROJECT: &str = "test-project";

pub fn link(collection: &str, name: &str) -> String {
    format!(
        "https://compute.googleapis.com/compute/v1/projects/{}/global/{}/{}",
        PROJECT, collection, name
    )
}

/// Budgets with millisecond delays so flows finish quickly.
pub fn fast_provisioning() -> ProvisioningConfig {
    ProvisioningConfig {
        operation_poll: PollConfig {
            max_attempts: 10,
            interval_ms: 1,
        },
        readiness_poll: PollConfig {
            max_attempts: 3,
            interval_ms: 1,
        },
        mutation_retry: RetryConfig {
            attempts: 5,
            delay_ms: 1,
            jitter_ratio: 0.0,
        },
    }
}

/// Mutable world behind [`FakeCompute`].
#[derive(Default)]
pub struct FakeState {
    pub certificates: Vec<SslCertificate>,
    pub backend_services: Vec<BackendService>,
    pub url_maps: Vec<UrlMap>,
    pub proxies: Vec<TargetHttpsProxy>,

    /// Every call, in order, by method name.
    pub calls: Vec<String>,
    /// Polls seen per operation name.
    pub polls: HashMap<String, u32>,
    next_id: u32,

    /// Operations report RUNNING this many times before DONE.
    pub pending_polls: u32,
    /// Operations of this type finish DONE with an error.
    pub failing_operation_type: Option<String>,
    /// `get_backend_service` returns 404 this many times first.
    pub backend_missing_polls: u32,
    /// `patch_backend_service` fails this many times first.
    pub backend_patch_failures: u32,
    /// A concurrent edit bumps the backend fingerprint before this many patches.
    pub backend_conflicts: u32,
    /// A concurrent edit adds `edited.example.net` to the first host rule
    /// before this many URL-map patches.
    pub url_map_conflicts: u32,
    /// A concurrent edit bumps the proxy fingerprint before this many patches.
    pub proxy_conflicts: u32,
}

impl FakeState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn operation(&mut self, kind: &str, target: String) -> Operation {
        let id = self.next();
        Operation {
            name: format!("operation-{}-{}", kind, id),
            status: OperationState::Pending,
            error: None,
            target_link: Some(target),
            operation_type: Some(kind.to_string()),
            self_link: None,
        }
    }
}

/// In-memory Compute API. Mutations apply immediately; their operations
/// report RUNNING `pending_polls` times before DONE. Every call yields to the
/// scheduler first, so concurrent flows interleave between their reads and
/// patches as they would against the real API.
#[derive(Default)]
pub struct FakeCompute {
    pub state: Mutex<FakeState>,
    operations: Mutex<HashMap<String, Operation>>,
}

impl FakeCompute {
    /// A complete load balancer named `lb`: backend service, URL map with one
    /// host rule, and an HTTPS proxy without certificates.
    pub fn with_load_balancer(lb: &str) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.backend_services.push(BackendService {
                name: lb.to_string(),
                self_link: Some(link("backendServices", lb)),
                ssl_certificates: Vec::new(),
                fingerprint: Some("bs-fp-1".into()),
            });
            state.url_maps.push(UrlMap {
                name: format!("{}-map", lb),
                self_link: Some(link("urlMaps", &format!("{}-map", lb))),
                default_service: Some(link("backendServices", lb)),
                host_rules: vec![HostRule {
                    hosts: vec!["old.example.org".into()],
                    path_matcher: "pm".into(),
                    extra: Default::default(),
                }],
                path_matchers: vec![PathMatcher {
                    name: "pm".into(),
                    default_service: Some(link("backendServices", lb)),
                    extra: Default::default(),
                }],
                fingerprint: Some("map-fp-1".into()),
            });
            state.proxies.push(TargetHttpsProxy {
                name: format!("{}-https-proxy", lb),
                self_link: Some(link("targetHttpsProxies", &format!("{}-https-proxy", lb))),
                url_map: Some(link("urlMaps", &format!("{}-map", lb))),
                ssl_certificates: Vec::new(),
                fingerprint: Some("proxy-fp-1".into()),
            });
        }
        Arc::new(fake)
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self, method: &str) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| *c == method).count())
    }

    async fn record(&self, method: &str) {
        tokio::task::yield_now().await;
        self.with_state(|s| s.calls.push(method.to_string()));
    }

    fn track(&self, op: Operation) -> Operation {
        self.operations
            .lock()
            .unwrap()
            .insert(op.name.clone(), op.clone());
        op
    }

    pub fn backend(&self, name: &str) -> BackendService {
        self.with_state(|s| s.backend_services.iter().find(|b| b.name == name).cloned().unwrap())
    }

    pub fn url_map(&self, name: &str) -> UrlMap {
        self.with_state(|s| s.url_maps.iter().find(|m| m.name == name).cloned().unwrap())
    }

    pub fn proxy(&self, name: &str) -> TargetHttpsProxy {
        self.with_state(|s| s.proxies.iter().find(|p| p.name == name).cloned().unwrap())
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    fn project(&self) -> &str {
        PROJECT
    }

    fn resource_link(&self, collection: &str, name: &str) -> String {
        link(collection, name)
    }

    async fn list_ssl_certificates(&self) -> ComputeResult<Vec<SslCertificate>> {
        self.record("list_ssl_certificates").await;
        Ok(self.with_state(|s| s.certificates.clone()))
    }

    async fn insert_ssl_certificate(&self, certificate: &SslCertificate) -> ComputeResult<Operation> {
        self.record("insert_ssl_certificate").await;
        let op = self.with_state(|s| {
            let mut stored = certificate.clone();
            stored.self_link = Some(link("sslCertificates", &certificate.name));
            s.certificates.push(stored);
            s.operation("insert", link("sslCertificates", &certificate.name))
        });
        Ok(self.track(op))
    }

    async fn list_backend_services(&self) -> ComputeResult<Vec<BackendService>> {
        self.record("list_backend_services").await;
        Ok(self.with_state(|s| s.backend_services.clone()))
    }

    async fn get_backend_service(&self, name: &str) -> ComputeResult<BackendService> {
        self.record("get_backend_service").await;
        self.with_state(|s| {
            if s.backend_missing_polls > 0 {
                s.backend_missing_polls -= 1;
                return Err(ComputeError::NotFound(format!("backendServices/{}", name)));
            }
            s.backend_services
                .iter()
                .find(|b| b.name == name)
                .cloned()
                .ok_or_else(|| ComputeError::NotFound(format!("backendServices/{}", name)))
        })
    }

    async fn patch_backend_service(&self, name: &str, patch: &BackendServicePatch) -> ComputeResult<Operation> {
        self.record("patch_backend_service").await;
        let op = self.with_state(|s| -> ComputeResult<Operation> {
            if s.backend_patch_failures > 0 {
                s.backend_patch_failures -= 1;
                return Err(ComputeError::Api {
                    status: 503,
                    message: "backend service is being updated".into(),
                });
            }
            let id = s.next();
            let concurrent_edit = s.backend_conflicts > 0;
            if concurrent_edit {
                s.backend_conflicts -= 1;
            }
            let service = s
                .backend_services
                .iter_mut()
                .find(|b| b.name == name)
                .ok_or_else(|| ComputeError::NotFound(format!("backendServices/{}", name)))?;
            if concurrent_edit {
                service.fingerprint = Some(format!("bs-fp-{}", id));
            }
            if patch.fingerprint.is_some() && patch.fingerprint != service.fingerprint {
                return Err(ComputeError::Conflict("backend service fingerprint mismatch".into()));
            }
            service.ssl_certificates = patch.ssl_certificates.clone();
            service.fingerprint = Some(format!("bs-fp-{}", id + 1));
            Ok(s.operation("patch", link("backendServices", name)))
        })?;
        Ok(self.track(op))
    }

    async fn list_url_maps(&self) -> ComputeResult<Vec<UrlMap>> {
        self.record("list_url_maps").await;
        Ok(self.with_state(|s| s.url_maps.clone()))
    }

    async fn patch_url_map(&self, name: &str, patch: &UrlMapPatch) -> ComputeResult<Operation> {
        self.record("patch_url_map").await;
        let op = self.with_state(|s| -> ComputeResult<Operation> {
            let id = s.next();
            let concurrent_edit = s.url_map_conflicts > 0;
            if concurrent_edit {
                s.url_map_conflicts -= 1;
            }
            let map = s
                .url_maps
                .iter_mut()
                .find(|m| m.name == name)
                .ok_or_else(|| ComputeError::NotFound(format!("urlMaps/{}", name)))?;
            if concurrent_edit {
                if let Some(rule) = map.host_rules.first_mut() {
                    rule.hosts.push("edited.example.net".into());
                }
                map.fingerprint = Some(format!("map-fp-{}", id));
            }
            if patch.fingerprint.is_some() && patch.fingerprint != map.fingerprint {
                return Err(ComputeError::Conflict("url map fingerprint mismatch".into()));
            }
            map.host_rules = patch.host_rules.clone();
            map.path_matchers = patch.path_matchers.clone();
            map.fingerprint = Some(format!("map-fp-{}", id + 1));
            Ok(s.operation("patch", link("urlMaps", name)))
        })?;
        Ok(self.track(op))
    }

    async fn list_target_https_proxies(&self) -> ComputeResult<Vec<TargetHttpsProxy>> {
        self.record("list_target_https_proxies").await;
        Ok(self.with_state(|s| s.proxies.clone()))
    }

    async fn get_target_https_proxy(&self, name: &str) -> ComputeResult<TargetHttpsProxy> {
        self.record("get_target_https_proxy").await;
        self.with_state(|s| {
            s.proxies
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| ComputeError::NotFound(format!("targetHttpsProxies/{}", name)))
        })
    }

    async fn patch_target_https_proxy(&self, name: &str, patch: &TargetHttpsProxyPatch) -> ComputeResult<Operation> {
        self.record("patch_target_https_proxy").await;
        let op = self.with_state(|s| -> ComputeResult<Operation> {
            let id = s.next();
            let concurrent_edit = s.proxy_conflicts > 0;
            if concurrent_edit {
                s.proxy_conflicts -= 1;
            }
            let proxy = s
                .proxies
                .iter_mut()
                .find(|p| p.name == name)
                .ok_or_else(|| ComputeError::NotFound(format!("targetHttpsProxies/{}", name)))?;
            if concurrent_edit {
                proxy.fingerprint = Some(format!("proxy-fp-{}", id));
            }
            if patch.fingerprint != proxy.fingerprint {
                return Err(ComputeError::Conflict("proxy fingerprint mismatch".into()));
            }
            proxy.ssl_certificates = patch.ssl_certificates.clone();
            proxy.fingerprint = Some(format!("proxy-fp-{}", id + 1));
            Ok(s.operation("patch", link("targetHttpsProxies", name)))
        })?;
        Ok(self.track(op))
    }

    async fn get_global_operation(&self, name: &str) -> ComputeResult<Operation> {
        self.record("get_global_operation").await;
        let mut op = self
            .operations
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ComputeError::NotFound(format!("operations/{}", name)))?;

        self.with_state(|s| {
            let seen = s.polls.entry(name.to_string()).or_insert(0);
            *seen += 1;
            if *seen <= s.pending_polls {
                op.status = OperationState::Running;
            } else {
                op.status = OperationState::Done;
                if s.failing_operation_type.is_some() && s.failing_operation_type == op.operation_type {
                    op.error = Some(OperationErrors {
                        errors: vec![OperationErrorItem {
                            code: Some("RESOURCE_NOT_READY".into()),
                            message: Some("simulated failure".into()),
                        }],
                    });
                }
            }
        });
        Ok(op)
    }
}

/// Start the real HTTP server on an ephemeral loopback port.
pub async fn start_server(compute: Arc<FakeCompute>) -> (SocketAddr, Shutdown) {
    let mut config = ServiceConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.provisioning = fast_provisioning();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, compute);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
