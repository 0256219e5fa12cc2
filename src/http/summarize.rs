//! `POST /api/summarize` handler.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::GovernorError;
use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::summarize::{IfNoneMatch, SummaryOutcome, SummaryRequest};

/// Cache state header: `HIT`, `STALE` or `MISS`.
pub const X_CACHE: &str = "x-cache";

#[derive(Serialize)]
struct SummaryBody<'a> {
    summary: &'a str,
}

fn etag(validator: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("\"{validator}\"")).ok()
}

pub async fn summarize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SummaryRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers).to_string();

    let response = match payload {
        Err(rejection) => {
            tracing::debug!(request_id = %request_id, error = %rejection.body_text(), "Rejected request body");
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
            } else {
                ApiError(GovernorError::Validation(format!(
                    "invalid request body: {}",
                    rejection.body_text()
                )))
                .into_response()
            }
        }
        Ok(Json(request)) => {
            let if_none_match = headers
                .get(header::IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok())
                .and_then(IfNoneMatch::parse);
            let max_content_chars = state.settings.load().security.max_content_chars;
            let kind = request.kind;

            match state
                .summaries
                .summarize(request, if_none_match.as_ref(), max_content_chars)
                .await
            {
                Ok(outcome) => {
                    tracing::debug!(request_id = %request_id, kind = kind.as_str(), "Summary served");
                    outcome_response(outcome)
                }
                Err(e) => {
                    tracing::info!(
                        request_id = %request_id,
                        kind = kind.as_str(),
                        error_kind = ?e.kind(),
                        error = %e,
                        "Summary request failed"
                    );
                    ApiError(e).into_response()
                }
            }
        }
    };

    metrics::record_request("summarize", response.status().as_u16(), start);
    response
}

fn outcome_response(outcome: SummaryOutcome) -> Response {
    match outcome {
        SummaryOutcome::Summary {
            summary,
            freshness,
            validator,
            fresh_remaining_ms,
        } => {
            let mut response = Json(SummaryBody { summary: &summary }).into_response();
            let headers = response.headers_mut();
            if let Some(tag) = etag(&validator) {
                headers.insert(header::ETAG, tag);
            }
            headers.insert(X_CACHE, HeaderValue::from_static(freshness.as_str()));
            if let Ok(value) = HeaderValue::from_str(&format!(
                "private, max-age={}",
                fresh_remaining_ms / 1000
            )) {
                headers.insert(header::CACHE_CONTROL, value);
            }
            response
        }
        SummaryOutcome::NotModified {
            freshness,
            validator,
        } => {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            let headers = response.headers_mut();
            if let Some(tag) = etag(&validator) {
                headers.insert(header::ETAG, tag);
            }
            headers.insert(X_CACHE, HeaderValue::from_static(freshness.as_str()));
            response
        }
    }
}
