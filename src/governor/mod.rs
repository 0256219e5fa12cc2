//! Outbound call governor.
//!
//! # Data Flow
//! ```text
//! generate(request)
//!     → fingerprint.rs (derive cache key)
//!     → cache.rs (fresh hit → return, no upstream call)
//!         stale hit → return now + background refresh (coalesced per key)
//!         miss ↓
//!     → admission.rs (window + breaker) ── denied → RateLimited
//!     → upstream TextGenerator
//!     → admission.rs (record attempt)
//!     → cache.rs (store on success)
//!     → classified result
//! ```
//!
//! # Design Decisions
//! - One `Governor` per process, cloned by handle into every handler
//! - Foreground misses are not coalesced; the window bounds total throughput
//! - The upstream call runs on its own task, so a dropped caller still
//!   records the attempt and fills the cache
//! - Background refresh failures are logged, never surfaced

pub mod admission;
pub mod cache;
pub mod fingerprint;
pub mod janitor;

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::error::{GovernorError, GovernorResult, RateLimitReason};
use crate::observability::metrics;
use crate::upstream::{GenerationParams, TextGenerator, UpstreamError};

pub use admission::{Admission, AdmissionController, AdmissionSnapshot};
pub use cache::{CacheHit, CacheSummary, ResponseCache};
pub use fingerprint::Fingerprint;
pub use janitor::CacheJanitor;

/// A cacheable generation request.
///
/// `content`, `variant` and `params` identify the request; `prompt` is what
/// is actually sent and is derived from the other fields by the caller.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub content: String,
    pub variant: String,
    pub prompt: String,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.content, &self.variant, &self.params)
    }
}

/// Where a returned payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Hit,
    Stale,
    Miss,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Hit => "HIT",
            Freshness::Stale => "STALE",
            Freshness::Miss => "MISS",
        }
    }
}

/// Successful governor result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: Arc<str>,
    pub freshness: Freshness,
    pub validator: String,
    /// Milliseconds the payload stays fresh (0 when stale).
    pub fresh_remaining_ms: u64,
}

struct GovernorInner {
    upstream: Arc<dyn TextGenerator>,
    cache: ResponseCache,
    admission: AdmissionController,
    clock: Arc<dyn Clock>,
    refreshing: DashMap<Fingerprint, ()>,
    fresh_ms: u64,
}

/// Cache + admission + breaker in front of one upstream.
#[derive(Clone)]
pub struct Governor {
    inner: Arc<GovernorInner>,
}

impl Governor {
    pub fn new(
        config: &GatewayConfig,
        upstream: Arc<dyn TextGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(GovernorInner {
                upstream,
                cache: ResponseCache::new(&config.cache),
                admission: AdmissionController::new(&config.rate_limit, &config.circuit_breaker),
                clock,
                refreshing: DashMap::new(),
                fresh_ms: config.cache.fresh_ms,
            }),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }

    /// Number of background refreshes still in flight.
    pub fn pending_refreshes(&self) -> usize {
        self.inner.refreshing.len()
    }

    /// Cache lookup without any upstream side effects.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheHit> {
        let hit = self.inner.cache.get(fingerprint, self.now_ms());
        metrics::record_cache_lookup(match &hit {
            Some(h) if h.is_stale => "stale",
            Some(_) => "hit",
            None => "miss",
        });
        hit
    }

    /// Generate text for `request`, serving from cache when possible.
    pub async fn generate(&self, request: GenerationRequest) -> GovernorResult<Generation> {
        let fingerprint = request.fingerprint();

        if let Some(hit) = self.lookup(&fingerprint) {
            let freshness = if hit.is_stale {
                self.refresh_in_background(request);
                Freshness::Stale
            } else {
                Freshness::Hit
            };
            tracing::debug!(
                fingerprint = %fingerprint.short(),
                freshness = freshness.as_str(),
                "Serving cached payload"
            );
            return Ok(Generation {
                text: hit.payload,
                freshness,
                validator: hit.validator,
                fresh_remaining_ms: hit.fresh_remaining_ms,
            });
        }

        let this = self.clone();
        let task_fingerprint = fingerprint.clone();
        let (text, validator) = tokio::spawn(async move {
            this.call_upstream(&task_fingerprint, &request).await
        })
        .await
        .unwrap_or_else(|e| {
            Err(GovernorError::UpstreamFailure {
                status: None,
                message: format!("upstream task failed: {e}"),
            })
        })?;

        Ok(Generation {
            text,
            freshness: Freshness::Miss,
            validator,
            fresh_remaining_ms: self.inner.fresh_ms,
        })
    }

    /// Schedule a best-effort refresh of `request`. At most one refresh per
    /// fingerprint runs at a time; returns `false` if one is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn refresh_in_background(&self, request: GenerationRequest) -> bool {
        let fingerprint = request.fingerprint();
        if self
            .inner
            .refreshing
            .insert(fingerprint.clone(), ())
            .is_some()
        {
            tracing::debug!(fingerprint = %fingerprint.short(), "Refresh already in flight");
            return false;
        }

        let this = self.clone();
        tokio::spawn(async move {
            let _guard = RefreshGuard {
                governor: &this,
                fingerprint: &fingerprint,
            };
            match this.call_upstream(&fingerprint, &request).await {
                Ok(_) => {
                    tracing::debug!(fingerprint = %fingerprint.short(), "Background refresh stored");
                    metrics::record_background_refresh("success");
                }
                Err(GovernorError::RateLimited {
                    retry_after_ms,
                    reason,
                }) => {
                    tracing::debug!(
                        fingerprint = %fingerprint.short(),
                        reason = %reason,
                        retry_after_ms,
                        "Background refresh abandoned"
                    );
                    metrics::record_background_refresh("abandoned");
                }
                Err(e) => {
                    tracing::warn!(
                        fingerprint = %fingerprint.short(),
                        error = %e,
                        "Background refresh failed, keeping stale entry"
                    );
                    metrics::record_background_refresh("failure");
                }
            }
        });
        true
    }

    /// Admission, upstream call, outcome recording and caching.
    async fn call_upstream(
        &self,
        fingerprint: &Fingerprint,
        request: &GenerationRequest,
    ) -> GovernorResult<(Arc<str>, String)> {
        let admission = self.inner.admission.check_admission(self.now_ms());
        if !admission.allowed {
            let reason = admission.reason.unwrap_or(RateLimitReason::Window);
            tracing::info!(
                fingerprint = %fingerprint.short(),
                reason = %reason,
                retry_after_ms = admission.retry_after_ms,
                "Admission denied"
            );
            return Err(GovernorError::rate_limited(admission.retry_after_ms, reason));
        }

        let start = Instant::now();
        let result = self
            .inner
            .upstream
            .generate_content(&request.prompt, &request.params)
            .await;
        let now = self.now_ms();

        match result {
            Ok(text) => {
                self.inner.admission.record_attempt(true, now);
                metrics::record_upstream_call("success", start);
                let validator = self.inner.cache.put(fingerprint.clone(), &text, now);
                Ok((Arc::from(text), validator))
            }
            Err(e) => {
                self.inner.admission.record_attempt(false, now);
                let classified = self.classify(e, now);
                metrics::record_upstream_call(
                    if classified.retry_after_ms().is_some() {
                        "rate_limited"
                    } else {
                        "failure"
                    },
                    start,
                );
                Err(classified)
            }
        }
    }

    /// Translate an upstream error into the governor taxonomy.
    fn classify(&self, error: UpstreamError, now_ms: u64) -> GovernorError {
        if error.is_rate_limited() {
            let retry_after_ms = error.retry_after_ms.unwrap_or_else(|| {
                self.inner
                    .admission
                    .next_available_delay_ms(now_ms)
                    .max(self.inner.admission.window_ms())
            });
            tracing::warn!(retry_after_ms, message = %error.message, "Upstream rate limited");
            return GovernorError::rate_limited(retry_after_ms, RateLimitReason::Upstream);
        }

        tracing::warn!(
            status = ?error.status,
            message = %error.message,
            "Upstream call failed"
        );
        GovernorError::UpstreamFailure {
            status: error.status,
            message: error.message,
        }
    }
}

/// Clears the in-flight marker even if the refresh task panics.
struct RefreshGuard<'a> {
    governor: &'a Governor,
    fingerprint: &'a Fingerprint,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.governor.inner.refreshing.remove(self.fingerprint);
    }
}
