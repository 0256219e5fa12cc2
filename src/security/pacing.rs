//! Endpoint-wide pacing guard.
//!
//! A single global minimum interval between admitted invocations of the
//! summarization endpoint. Rejections grow the interval, successful responses
//! shrink it back toward the configured minimum. This sheds load before the
//! governor is reached. It is endpoint-wide and does not look at
//! fingerprints or clients.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::clock::Clock;
use crate::config::PacingConfig;
use crate::error::{GovernorError, RateLimitReason};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::resilience::backoff::{decay, grow};

struct PacingState {
    config: PacingConfig,
    interval_ms: u64,
    last_admitted_ms: Option<u64>,
}

pub struct PacingGuard {
    state: Mutex<PacingState>,
    clock: Arc<dyn Clock>,
}

impl PacingGuard {
    pub fn new(config: PacingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(PacingState {
                interval_ms: config.min_interval_ms,
                config,
                last_admitted_ms: None,
            }),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PacingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit or reject an invocation now. `Err` carries the retry hint in ms.
    pub fn try_acquire(&self) -> Result<(), u64> {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        if state.config.min_interval_ms == 0 {
            return Ok(());
        }

        if let Some(last) = state.last_admitted_ms {
            let elapsed = now.saturating_sub(last);
            if elapsed < state.interval_ms {
                let retry_after_ms = state.interval_ms - elapsed;
                state.interval_ms = grow(
                    state.interval_ms,
                    state.config.backoff_multiplier,
                    state.config.max_interval_ms,
                );
                return Err(retry_after_ms);
            }
        }

        state.last_admitted_ms = Some(now);
        Ok(())
    }

    /// Decay the interval after a successful response.
    pub fn on_success(&self) {
        let mut state = self.lock();
        state.interval_ms = decay(
            state.interval_ms,
            state.config.backoff_multiplier,
            state.config.min_interval_ms,
        );
    }

    /// Apply a reloaded configuration, keeping the admission history.
    pub fn reconfigure(&self, config: PacingConfig) {
        let mut state = self.lock();
        state.interval_ms = state
            .interval_ms
            .clamp(config.min_interval_ms, config.max_interval_ms.max(config.min_interval_ms));
        state.config = config;
    }

    pub fn current_interval_ms(&self) -> u64 {
        self.lock().interval_ms
    }
}

/// Middleware applying the pacing guard to a route.
pub async fn pacing_middleware(
    State(guard): State<Arc<PacingGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match guard.try_acquire() {
        Ok(()) => {
            let response = next.run(request).await;
            let status = response.status();
            if status.is_success() || status == StatusCode::NOT_MODIFIED {
                guard.on_success();
            }
            response
        }
        Err(retry_after_ms) => {
            tracing::warn!(
                retry_after_ms,
                interval_ms = guard.current_interval_ms(),
                "Endpoint pacing rejected request"
            );
            metrics::record_pacing_rejected();
            ApiError(GovernorError::rate_limited(
                retry_after_ms,
                RateLimitReason::Pacing,
            ))
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn guard(clock: Arc<ManualClock>) -> PacingGuard {
        PacingGuard::new(
            PacingConfig {
                min_interval_ms: 100,
                backoff_multiplier: 2.0,
                max_interval_ms: 1_000,
            },
            clock,
        )
    }

    #[test]
    fn test_rejects_within_interval_and_grows() {
        let clock = Arc::new(ManualClock::new(0));
        let guard = guard(clock.clone());

        assert!(guard.try_acquire().is_ok());
        clock.advance(40);
        assert_eq!(guard.try_acquire(), Err(60));
        assert_eq!(guard.current_interval_ms(), 200);

        clock.advance(100);
        assert_eq!(guard.try_acquire(), Err(60), "grown interval applies");
        assert_eq!(guard.current_interval_ms(), 400);

        clock.advance(260);
        assert!(guard.try_acquire().is_ok());
    }

    #[test]
    fn test_success_decays_to_minimum() {
        let clock = Arc::new(ManualClock::new(0));
        let guard = guard(clock.clone());
        guard.try_acquire().unwrap();
        for _ in 0..10 {
            let _ = guard.try_acquire();
        }
        assert_eq!(guard.current_interval_ms(), 1_000, "capped at max");

        guard.on_success();
        assert_eq!(guard.current_interval_ms(), 500);
        for _ in 0..5 {
            guard.on_success();
        }
        assert_eq!(guard.current_interval_ms(), 100);
    }

    #[test]
    fn test_zero_interval_disables() {
        let clock = Arc::new(ManualClock::new(0));
        let guard = PacingGuard::new(
            PacingConfig {
                min_interval_ms: 0,
                ..PacingConfig::default()
            },
            clock,
        );
        for _ in 0..100 {
            assert!(guard.try_acquire().is_ok());
        }
    }

    #[test]
    fn test_reconfigure_clamps_interval() {
        let clock = Arc::new(ManualClock::new(0));
        let guard = guard(clock);
        guard.try_acquire().unwrap();
        for _ in 0..5 {
            let _ = guard.try_acquire();
        }
        guard.reconfigure(PacingConfig {
            min_interval_ms: 10,
            backoff_multiplier: 2.0,
            max_interval_ms: 300,
        });
        assert_eq!(guard.current_interval_ms(), 300);
    }
}
