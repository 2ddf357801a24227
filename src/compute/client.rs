//! Compute Engine v1 REST client.
//!
//! # Responsibilities
//! - Build global-resource URLs for the configured project
//! - Attach bearer credentials to every call
//! - Follow list pagination
//! - Map the Google error envelope onto `ComputeError`

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::compute::auth::{MetadataServer, StaticToken, TokenSource};
use crate::compute::types::*;
use crate::compute::ComputeApi;
use crate::config::GcpConfig;

const SSL_CERTIFICATES: &str = "sslCertificates";
const BACKEND_SERVICES: &str = "backendServices";
const URL_MAPS: &str = "urlMaps";
const TARGET_HTTPS_PROXIES: &str = "targetHttpsProxies";
const OPERATIONS: &str = "operations";

/// Compute API client bound to one project.
#[derive(Clone)]
pub struct GceClient {
    http: reqwest::Client,
    base_url: Url,
    project: String,
    tokens: Arc<dyn TokenSource>,
}

impl GceClient {
    /// Create a client from explicit parts.
    pub fn new(
        http: reqwest::Client,
        api_base_url: &str,
        project: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> ComputeResult<Self> {
        let base_url = Url::parse(api_base_url)
            .map_err(|e| ComputeError::Decode(format!("Invalid API base URL '{}': {}", api_base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ComputeError::Decode(format!("API base URL '{}' cannot be a base", api_base_url)));
        }

        Ok(Self {
            http,
            base_url,
            project: project.into(),
            tokens,
        })
    }

    /// Create a client from configuration, resolving credentials and project.
    ///
    /// A configured access token wins over the metadata server. The project
    /// falls back to the metadata server when not configured.
    pub async fn from_config(config: &GcpConfig) -> ComputeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let metadata = MetadataServer::new(http.clone(), &config.metadata_url);

        let project = match &config.project {
            Some(project) => project.clone(),
            None => metadata.project_id().await?,
        };

        let tokens: Arc<dyn TokenSource> = match &config.access_token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(metadata),
        };

        tracing::info!(
            project = %project,
            api_base_url = %config.api_base_url,
            static_token = config.access_token.is_some(),
            "Compute client initialized"
        );

        Self::new(http, &config.api_base_url, project, tokens)
    }

    /// URL of a global collection, or of one resource in it.
    fn global_url(&self, collection: &str, name: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        {
            // Checked in `new`: the base URL can always carry path segments.
            if let Ok(mut segments) = url.path_segments_mut() {
                segments
                    .pop_if_empty()
                    .extend(["projects", self.project.as_str(), "global", collection]);
                if let Some(name) = name {
                    segments.push(name);
                }
            }
        }
        url
    }

    async fn request<B, T>(&self, method: Method, url: Url, query: &[(&str, &str)], body: Option<&B>) -> ComputeResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.tokens.token().await?;
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, url = %url, "Compute API request");
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map_err(|e| ComputeError::Decode(format!("{} {}: {}", method, url.path(), e)));
        }

        let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
            .map(|env| env.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());

        tracing::debug!(method = %method, url = %url, status = %status, message = %message, "Compute API error");

        Err(match status {
            StatusCode::NOT_FOUND => ComputeError::NotFound(message),
            StatusCode::PRECONDITION_FAILED => ComputeError::Conflict(message),
            _ => ComputeError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> ComputeResult<T> {
        self.request::<(), T>(Method::GET, url, &[], None).await
    }

    async fn send<B: Serialize + ?Sized>(&self, method: Method, url: Url, body: &B) -> ComputeResult<Operation> {
        self.request(method, url, &[], Some(body)).await
    }

    /// Fetch every page of a global collection.
    async fn list_all<T: DeserializeOwned>(&self, collection: &str) -> ComputeResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.global_url(collection, None);
            let query: Vec<(&str, &str)> = match page_token.as_deref() {
                Some(token) => vec![("pageToken", token)],
                None => Vec::new(),
            };
            let page: ListPage<T> = self.request::<(), _>(Method::GET, url, &query, None).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl ComputeApi for GceClient {
    fn project(&self) -> &str {
        &self.project
    }

    fn resource_link(&self, collection: &str, name: &str) -> String {
        self.global_url(collection, Some(name)).to_string()
    }

    async fn list_ssl_certificates(&self) -> ComputeResult<Vec<SslCertificate>> {
        self.list_all(SSL_CERTIFICATES).await
    }

    async fn insert_ssl_certificate(&self, certificate: &SslCertificate) -> ComputeResult<Operation> {
        self.send(Method::POST, self.global_url(SSL_CERTIFICATES, None), certificate).await
    }

    async fn list_backend_services(&self) -> ComputeResult<Vec<BackendService>> {
        self.list_all(BACKEND_SERVICES).await
    }

    async fn get_backend_service(&self, name: &str) -> ComputeResult<BackendService> {
        self.get(self.global_url(BACKEND_SERVICES, Some(name))).await
    }

    async fn patch_backend_service(&self, name: &str, patch: &BackendServicePatch) -> ComputeResult<Operation> {
        self.send(Method::PATCH, self.global_url(BACKEND_SERVICES, Some(name)), patch).await
    }

    async fn list_url_maps(&self) -> ComputeResult<Vec<UrlMap>> {
        self.list_all(URL_MAPS).await
    }

    async fn patch_url_map(&self, name: &str, patch: &UrlMapPatch) -> ComputeResult<Operation> {
        self.send(Method::PATCH, self.global_url(URL_MAPS, Some(name)), patch).await
    }

    async fn list_target_https_proxies(&self) -> ComputeResult<Vec<TargetHttpsProxy>> {
        self.list_all(TARGET_HTTPS_PROXIES).await
    }

    async fn get_target_https_proxy(&self, name: &str) -> ComputeResult<TargetHttpsProxy> {
        self.get(self.global_url(TARGET_HTTPS_PROXIES, Some(name))).await
    }

    async fn patch_target_https_proxy(&self, name: &str, patch: &TargetHttpsProxyPatch) -> ComputeResult<Operation> {
        self.send(Method::PATCH, self.global_url(TARGET_HTTPS_PROXIES, Some(name)), patch).await
    }

    async fn get_global_operation(&self, name: &str) -> ComputeResult<Operation> {
        self.get(self.global_url(OPERATIONS, Some(name))).await
    }
}

impl std::fmt::Debug for GceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GceClient")
            .field("base_url", &self.base_url.as_str())
            .field("project", &self.project)
            .finish()
    }
}
