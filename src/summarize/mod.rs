//! Email summarization policy on top of the governor.
//!
//! # Data Flow
//! ```text
//! SummaryRequest { content, type }
//!     → validate (blank / oversized content rejected, never counted as a failure)
//!     → If-None-Match matches a live entry → NotModified (stale entries still refresh)
//!     → Governor::generate → Summary { text, HIT | STALE | MISS, validator }
//! ```
//!
//! The endpoint-wide pacing guard sits in front of this, see
//! [`crate::security::pacing`].

pub mod kind;

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{GovernorError, GovernorResult};
use crate::governor::{Freshness, GenerationRequest, Governor};

pub use kind::SummaryKind;

/// Body of `POST /api/summarize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: SummaryKind,
}

impl SummaryRequest {
    pub fn validate(&self, max_content_chars: usize) -> GovernorResult<()> {
        if self.content.trim().is_empty() {
            return Err(GovernorError::Validation("content must not be empty".into()));
        }
        let chars = self.content.chars().count();
        if chars > max_content_chars {
            return Err(GovernorError::Validation(format!(
                "content is {chars} characters, limit is {max_content_chars}"
            )));
        }
        Ok(())
    }

    pub fn to_generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            content: self.content.clone(),
            variant: self.kind.as_str().to_string(),
            prompt: self.kind.prompt(&self.content),
            params: self.kind.generation_params(),
        }
    }
}

/// Parsed `If-None-Match` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfNoneMatch {
    Any,
    Tags(Vec<String>),
}

impl IfNoneMatch {
    /// Parse a header value such as `"abc", W/"def"` or `*`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value == "*" {
            return Some(IfNoneMatch::Any);
        }
        let tags: Vec<String> = value
            .split(',')
            .map(|tag| tag.trim())
            .map(|tag| tag.strip_prefix("W/").unwrap_or(tag))
            .map(|tag| tag.trim_matches('"'))
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        if tags.is_empty() {
            None
        } else {
            Some(IfNoneMatch::Tags(tags))
        }
    }

    pub fn matches(&self, validator: &str) -> bool {
        match self {
            IfNoneMatch::Any => true,
            IfNoneMatch::Tags(tags) => tags.iter().any(|tag| tag == validator),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summary {
        summary: Arc<str>,
        freshness: Freshness,
        validator: String,
        fresh_remaining_ms: u64,
    },
    /// The caller already holds the current value.
    NotModified {
        freshness: Freshness,
        validator: String,
    },
}

/// Summarization entry point shared by all handlers.
#[derive(Clone)]
pub struct SummaryService {
    governor: Governor,
}

impl SummaryService {
    pub fn new(governor: Governor) -> Self {
        Self { governor }
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub async fn summarize(
        &self,
        request: SummaryRequest,
        if_none_match: Option<&IfNoneMatch>,
        max_content_chars: usize,
    ) -> GovernorResult<SummaryOutcome> {
        request.validate(max_content_chars)?;
        let generation_request = request.to_generation_request();

        if let Some(condition) = if_none_match {
            let fingerprint = generation_request.fingerprint();
            if let Some(hit) = self.governor.lookup(&fingerprint) {
                if condition.matches(&hit.validator) {
                    let freshness = if hit.is_stale {
                        self.governor.refresh_in_background(generation_request);
                        Freshness::Stale
                    } else {
                        Freshness::Hit
                    };
                    tracing::debug!(
                        fingerprint = %fingerprint.short(),
                        kind = request.kind.as_str(),
                        "Validator matched, not modified"
                    );
                    return Ok(SummaryOutcome::NotModified {
                        freshness,
                        validator: hit.validator,
                    });
                }
            }
        }

        let generation = self.governor.generate(generation_request).await?;
        let summary: Arc<str> = Arc::from(generation.text.trim());
        Ok(SummaryOutcome::Summary {
            summary,
            freshness: generation.freshness,
            validator: generation.validator,
            fresh_remaining_ms: generation.fresh_remaining_ms,
        })
    }
}
