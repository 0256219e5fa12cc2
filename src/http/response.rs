//! Error → HTTP response mapping.
//!
//! Upstream details are logged by the governor and never echoed to clients.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::GovernorError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

/// Wrapper giving [`GovernorError`] an HTTP representation.
#[derive(Debug)]
pub struct ApiError(pub GovernorError);

impl From<GovernorError> for ApiError {
    fn from(err: GovernorError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GovernorError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GovernorError::Validation(_) => StatusCode::BAD_REQUEST,
            GovernorError::UpstreamFailure { .. } | GovernorError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// `Retry-After` is whole seconds; round up so clients never retry early.
pub fn retry_after_secs(retry_after_ms: u64) -> u64 {
    retry_after_ms.div_ceil(1000)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            GovernorError::RateLimited { retry_after_ms, .. } => ErrorBody {
                error: "Rate limit exceeded, please retry later".to_string(),
                retry_after_ms: Some(*retry_after_ms),
            },
            GovernorError::Validation(message) => ErrorBody {
                error: message.clone(),
                retry_after_ms: None,
            },
            GovernorError::UpstreamFailure { .. } | GovernorError::Configuration(_) => ErrorBody {
                error: "Failed to generate summary".to_string(),
                retry_after_ms: None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after_ms) = self.0.retry_after_ms() {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after_ms)),
            );
        }
        response
    }
}
