//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::GovernorError;
use crate::upstream::{GenerationParams, TextGenerator, UpstreamError};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: &'a GenerationParams,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// reqwest-backed client for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &UpstreamConfig, api_key: String) -> Result<Self, GovernorError> {
        let endpoint = generate_endpoint(&config.base_url, &config.model)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GovernorError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn generate_endpoint(base_url: &str, model: &str) -> Result<Url, GovernorError> {
    let mut base = Url::parse(base_url)
        .map_err(|e| GovernorError::Configuration(format!("upstream.base_url: {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("v1beta/models/{model}:generateContent"))
        .map_err(|e| GovernorError::Configuration(format!("upstream.model: {e}")))
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_content(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, UpstreamError> {
        let body = GenerateRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: params,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "upstream request timed out".to_string()
                } else {
                    format!("upstream request failed: {e}")
                };
                UpstreamError::new(e.status().map(|s| s.as_u16()), message)
            })?;

        let status = response.status();
        let header_retry = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));
        let text = response.text().await.map_err(|e| {
            UpstreamError::new(Some(status.as_u16()), format!("failed to read body: {e}"))
        })?;

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &text, header_retry));
        }

        extract_text(&text).map_err(|message| UpstreamError::new(Some(status.as_u16()), message))
    }
}

/// Build an [`UpstreamError`] from a non-success response body.
fn error_from_body(status: u16, body: &str, header_retry: Option<u64>) -> UpstreamError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error")).cloned();

    let message = error
        .as_ref()
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("upstream returned status {status}"));

    let retry_after_ms = error
        .as_ref()
        .and_then(|e| e.get("details"))
        .and_then(retry_delay_from_details)
        .or(header_retry);

    let err = UpstreamError::new(Some(status), message).with_retry_after_ms(retry_after_ms);
    match error {
        Some(details) => err.with_details(details),
        None => err,
    }
}

/// Find a `google.rpc.RetryInfo` entry and convert its `retryDelay` to ms.
fn retry_delay_from_details(details: &serde_json::Value) -> Option<u64> {
    details.as_array()?.iter().find_map(|detail| {
        let kind = detail.get("@type")?.as_str()?;
        if !kind.ends_with("RetryInfo") {
            return None;
        }
        parse_duration_ms(detail.get("retryDelay")?.as_str()?)
    })
}

/// Parse a protobuf JSON duration such as `"12s"` or `"1.5s"`.
fn parse_duration_ms(value: &str) -> Option<u64> {
    let secs: f64 = value.trim().strip_suffix('s')?.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some((secs * 1000.0).round() as u64)
    } else {
        None
    }
}

fn extract_text(body: &str) -> Result<String, String> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed upstream response: {e}"))?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| "upstream returned no candidates".to_string())?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err("upstream returned an empty candidate".to_string());
    }
    Ok(text)
}
