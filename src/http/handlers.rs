//! Route handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::http::request::request_id;
use crate::http::response::MessageResponse;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::provisioning::{ProvisionError, ProvisionRequest};

const MISSING_FIELDS: &str = "Domain and load balancer name are required.";

/// JSON body of `POST /generate-cert`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCertBody {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub load_balancer_name: Option<String>,
}

impl GenerateCertBody {
    /// Both fields present and non-blank.
    pub fn validate(self) -> Result<ProvisionRequest, ProvisionError> {
        let domain = non_blank(self.domain);
        let load_balancer_name = non_blank(self.load_balancer_name);

        match (domain, load_balancer_name) {
            (Some(domain), Some(load_balancer_name)) => Ok(ProvisionRequest {
                domain,
                load_balancer_name,
            }),
            _ => Err(ProvisionError::Validation(MISSING_FIELDS.to_string())),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `POST /generate-cert`
pub async fn generate_cert(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateCertBody>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers).to_string();

    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::warn!(request_id = %request_id, "Request body too large");
            metrics::record_request("rejected", start);
            return rejection.into_response();
        }
        Err(rejection) => {
            tracing::warn!(request_id = %request_id, error = %rejection.body_text(), "Unreadable request body");
            metrics::record_request("validation", start);
            return ProvisionError::Validation(MISSING_FIELDS.to_string()).into_response();
        }
    };

    let request = match body.validate() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(request_id = %request_id, "Missing domain or load balancer name");
            metrics::record_request(e.kind(), start);
            return e.into_response();
        }
    };

    tracing::info!(
        request_id = %request_id,
        domain = %request.domain,
        load_balancer = %request.load_balancer_name,
        "Provisioning certificate"
    );

    match state.provisioner.provision(&request).await {
        Ok(_) => {
            metrics::record_request("success", start);
            MessageResponse::success().into_response()
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                kind = e.kind(),
                error = %e,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Provisioning failed"
            );
            metrics::record_request(e.kind(), start);
            e.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
