//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the summary gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Text-generation upstream.
    pub upstream: UpstreamConfig,

    /// Sliding-window admission limits.
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker policy.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Response cache lifetimes.
    pub cache: CacheConfig,

    /// Endpoint-level pacing guard.
    pub pacing: PacingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream text-generation service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API root, without the version segment.
    pub base_url: String,

    /// Model identifier used in the request path.
    pub model: String,

    /// API credential. `GEMINI_API_KEY` in the environment takes precedence.
    pub api_key: Option<String>,

    /// HTTP client timeout for a single generation call, in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Sliding-window admission configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Rolling window length in milliseconds.
    pub window_ms: u64,

    /// Maximum upstream attempts per window.
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,

    /// Cooldown before a half-open probe is allowed, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Growth factor for the failure-aware backoff estimate.
    pub backoff_multiplier: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
            backoff_multiplier: 1.5,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Age up to which an entry is served as fresh.
    pub fresh_ms: u64,

    /// Age up to which an entry is still served (stale) while refreshing.
    pub stale_ms: u64,

    /// Interval of the expired-entry sweep, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ms: 60 * 60 * 1000,
            stale_ms: 24 * 60 * 60 * 1000,
            sweep_interval_secs: 300,
        }
    }
}

/// Endpoint-wide pacing guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PacingConfig {
    /// Minimum spacing between admitted invocations. 0 disables pacing.
    pub min_interval_ms: u64,

    /// Growth factor on rejection, and divisor on success.
    pub backoff_multiplier: f64,

    /// Upper bound for the grown interval.
    pub max_interval_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 250,
            backoff_multiplier: 2.0,
            max_interval_ms: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Maximum number of characters of email content accepted for summarization.
    pub max_content_chars: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
            max_content_chars: 100_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

impl GatewayConfig {
    /// True when the two configs differ in settings that are baked into the
    /// governor at startup (window, breaker, cache lifetimes, upstream).
    pub fn governor_settings_differ(&self, other: &GatewayConfig) -> bool {
        self.rate_limit != other.rate_limit
            || self.circuit_breaker != other.circuit_breaker
            || self.cache != other.cache
            || self.upstream != other.upstream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = GatewayConfig::default();
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.reset_timeout_ms, 30_000);
        assert_eq!(config.circuit_breaker.backoff_multiplier, 1.5);
        assert_eq!(config.cache.fresh_ms, 3_600_000);
        assert_eq!(config.cache.stale_ms, 86_400_000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [rate_limit]
            max_requests = 5

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.pacing, PacingConfig::default());
    }

    #[test]
    fn test_governor_settings_differ() {
        let base = GatewayConfig::default();
        let mut paced = base.clone();
        paced.pacing.min_interval_ms = 5;
        assert!(!base.governor_settings_differ(&paced));

        let mut windowed = base.clone();
        windowed.rate_limit.window_ms = 1_000;
        assert!(base.governor_settings_differ(&windowed));
    }
}
