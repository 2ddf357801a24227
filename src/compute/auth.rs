//! Credential acquisition for the Compute API.
//!
//! # Responsibilities
//! - Supply a bearer token for every API call
//! - Resolve the project id when it is not configured
//!
//! # Security Constraints
//! - Tokens are never logged
//! - Static tokens come only from config or `GOOGLE_OAUTH_ACCESS_TOKEN`

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::compute::types::{ComputeError, ComputeResult};

const METADATA_FLAVOR: &str = "Metadata-Flavor";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of OAuth bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token.
    async fn token(&self) -> ComputeResult<String>;
}

/// A fixed, externally managed token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> ComputeResult<String> {
        Ok(self.0.clone())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Default service-account credentials from the instance metadata server.
pub struct MetadataServer {
    http: reqwest::Client,
    base_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServer {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Project id of the instance this process runs on.
    pub async fn project_id(&self) -> ComputeResult<String> {
        let url = format!("{}/project/project-id", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(METADATA_FLAVOR, "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ComputeError::Auth(format!(
                "metadata server returned {} for project id",
                response.status()
            )));
        }

        let project = response.text().await?.trim().to_string();
        if project.is_empty() {
            return Err(ComputeError::Auth("metadata server returned an empty project id".into()));
        }
        Ok(project)
    }

    async fn fetch_token(&self) -> ComputeResult<MetadataToken> {
        let url = format!("{}/instance/service-accounts/default/token", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(METADATA_FLAVOR, "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ComputeError::Auth(format!(
                "metadata server returned {} for token",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ComputeError::Auth(format!("malformed token response: {}", e)))
    }
}

#[async_trait]
impl TokenSource for MetadataServer {
    async fn token(&self) -> ComputeResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(expires_in = fresh.expires_in, "Fetched access token from metadata server");

        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }
}
