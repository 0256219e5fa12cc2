//! Text-generation upstream.
//!
//! # Data Flow
//! ```text
//! Governor
//!     → TextGenerator::generate_content(prompt, params)
//!         → gemini.rs (reqwest POST, JSON body)
//!     ← text | UpstreamError { status, message, retry hint }
//! ```
//!
//! # Design Decisions
//! - The trait is the seam for tests; the governor never sees reqwest types
//! - No local timeout here beyond the HTTP client's own
//! - `UpstreamError` stays inside the governor; callers see `GovernorError`

pub mod gemini;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use gemini::GeminiClient;

/// Sampling parameters forwarded to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

/// Failure reported by the upstream (or by the transport reaching it).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct UpstreamError {
    /// HTTP status, absent for transport-level failures.
    pub status: Option<u16>,
    pub message: String,
    /// Retry hint supplied by the upstream, if any.
    pub retry_after_ms: Option<u64>,
    /// Structured error payload, when the upstream returned one.
    pub details: Option<serde_json::Value>,
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after_ms: None,
            details: None,
        }
    }

    pub fn with_retry_after_ms(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }
}

/// An upstream capable of turning a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_content(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, UpstreamError>;
}
