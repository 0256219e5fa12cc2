//! Configuration validation.
//!
//! Semantic checks only; serde already handled syntax. Every violation is
//! reported, not just the first one.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, ADMIN_KEY_PLACEHOLDER};

/// A single semantic violation, keyed by the offending field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if url::Url::parse(&config.upstream.base_url).is_err() {
        errors.push(ValidationError::new(
            "upstream.base_url",
            format!("'{}' is not a valid URL", config.upstream.base_url),
        ));
    }
    if config.upstream.model.trim().is_empty() {
        errors.push(ValidationError::new("upstream.model", "must not be empty"));
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be > 0"));
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be >= 1",
        ));
    }
    if !(config.circuit_breaker.backoff_multiplier >= 1.0) {
        errors.push(ValidationError::new(
            "circuit_breaker.backoff_multiplier",
            "must be >= 1.0",
        ));
    }

    if config.cache.fresh_ms > config.cache.stale_ms {
        errors.push(ValidationError::new(
            "cache.fresh_ms",
            format!(
                "fresh duration {} ms exceeds stale duration {} ms",
                config.cache.fresh_ms, config.cache.stale_ms
            ),
        ));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("cache.sweep_interval_secs", "must be > 0"));
    }

    if !(config.pacing.backoff_multiplier >= 1.0) {
        errors.push(ValidationError::new("pacing.backoff_multiplier", "must be >= 1.0"));
    }
    if config.pacing.max_interval_ms < config.pacing.min_interval_ms {
        errors.push(ValidationError::new(
            "pacing.max_interval_ms",
            "must be >= pacing.min_interval_ms",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.security.max_content_chars == 0 {
        errors.push(ValidationError::new("security.max_content_chars", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        let key = config.admin.api_key.trim();
        if key.is_empty() || key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a real secret when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
