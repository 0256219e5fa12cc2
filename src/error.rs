//! Error taxonomy surfaced by the call governor.
//!
//! Raw upstream errors never cross the governor boundary; they are classified
//! into one of the variants below first.

use std::fmt;
use thiserror::Error;

/// Why a call was refused before (or instead of) reaching the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// The sliding window is full.
    Window,
    /// The circuit breaker is open.
    CircuitOpen,
    /// The breaker is half-open and its single probe is already in flight.
    HalfOpenProbe,
    /// The upstream itself answered 429.
    Upstream,
    /// The endpoint-level pacing guard rejected the invocation.
    Pacing,
}

impl RateLimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitReason::Window => "window",
            RateLimitReason::CircuitOpen => "circuit_open",
            RateLimitReason::HalfOpenProbe => "half_open_probe",
            RateLimitReason::Upstream => "upstream",
            RateLimitReason::Pacing => "pacing",
        }
    }
}

impl fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error category, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    UpstreamFailure,
    ConfigurationError,
    ValidationError,
}

/// Errors returned by [`crate::governor::Governor`] and the summarization policy.
#[derive(Debug, Clone, Error)]
pub enum GovernorError {
    /// Admission denied, breaker open, or upstream 429. Always safe to retry later.
    #[error("rate limited ({reason}), retry after {retry_after_ms} ms")]
    RateLimited {
        retry_after_ms: u64,
        reason: RateLimitReason,
    },

    /// The generation call failed for a reason other than rate limiting.
    #[error("upstream failure{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    UpstreamFailure {
        status: Option<u16>,
        message: String,
    },

    /// Missing credential or unusable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed request at the endpoint boundary.
    #[error("validation error: {0}")]
    Validation(String),
}

impl GovernorError {
    pub fn rate_limited(retry_after_ms: u64, reason: RateLimitReason) -> Self {
        Self::RateLimited {
            retry_after_ms,
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernorError::RateLimited { .. } => ErrorKind::RateLimited,
            GovernorError::UpstreamFailure { .. } => ErrorKind::UpstreamFailure,
            GovernorError::Configuration(_) => ErrorKind::ConfigurationError,
            GovernorError::Validation(_) => ErrorKind::ValidationError,
        }
    }

    /// Retry hint, present exactly for [`GovernorError::RateLimited`].
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GovernorError::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

pub type GovernorResult<T> = std::result::Result<T, GovernorError>;
