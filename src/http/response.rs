//! Mapping of provisioning outcomes onto HTTP responses.
//!
//! # Design Decisions
//! - Error bodies are plain text and never carry upstream detail
//! - Validation → 400, missing load-balancer component → 404, everything else → 500

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::provisioning::ProvisionError;

/// Body of a successful `POST /generate-cert`.
pub const SUCCESS_MESSAGE: &str = "Domain configured successfully";

/// Plain-text body for every operational failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Error creating SSL certificate and updating load balancer.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn success() -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl ProvisionError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProvisionError::Validation(_) => StatusCode::BAD_REQUEST,
            ProvisionError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProvisionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ProvisionError::Validation(message) | ProvisionError::NotFound(message) => message,
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        };
        (status, body).into_response()
    }
}
