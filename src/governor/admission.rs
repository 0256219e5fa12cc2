//! Sliding-window admission control in front of the upstream.
//!
//! The controller owns the rate window and the circuit breaker for one
//! upstream target. `check_admission` only decides; the attempt is recorded
//! separately once the upstream call resolves, so every attempt (success or
//! failure) consumes a window slot at its resolution time.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::config::{CircuitBreakerConfig, RateLimitConfig};
use crate::error::RateLimitReason;
use crate::observability::metrics;
use crate::resilience::backoff::failure_backoff;
use crate::resilience::{CircuitDecision, CircuitPhase, CircuitState};

/// Admission verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub retry_after_ms: u64,
    /// Set when denied.
    pub reason: Option<RateLimitReason>,
}

impl Admission {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_ms: 0,
            reason: None,
        }
    }

    fn deny(retry_after_ms: u64, reason: RateLimitReason) -> Self {
        Self {
            allowed: false,
            retry_after_ms,
            reason: Some(reason),
        }
    }
}

/// Timestamps of recent attempts, oldest first.
#[derive(Debug)]
struct RateWindow {
    requests: VecDeque<u64>,
    window_ms: u64,
    max_requests: usize,
}

impl RateWindow {
    /// Drop attempts whose age has reached the window length.
    fn prune(&mut self, now_ms: u64) {
        while self
            .requests
            .front()
            .is_some_and(|&t| now_ms.saturating_sub(t) >= self.window_ms)
        {
            self.requests.pop_front();
        }
    }

    /// Wait until the oldest slot leaves the window, or 0 with capacity left.
    fn base_wait_ms(&self, now_ms: u64) -> u64 {
        if self.requests.len() < self.max_requests {
            return 0;
        }
        self.requests
            .front()
            .map(|&oldest| (oldest + self.window_ms).saturating_sub(now_ms))
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct AdmissionState {
    window: RateWindow,
    circuit: CircuitState,
}

/// Point-in-time view for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionSnapshot {
    pub window_ms: u64,
    pub max_requests: usize,
    pub requests_in_window: usize,
    pub circuit_phase: &'static str,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    /// Remaining cooldown while the breaker is open.
    pub open_remaining_ms: Option<u64>,
    pub next_available_delay_ms: u64,
}

/// Rate window plus circuit breaker for a single upstream target.
pub struct AdmissionController {
    state: Mutex<AdmissionState>,
    breaker: CircuitBreakerConfig,
}

impl AdmissionController {
    pub fn new(rate_limit: &RateLimitConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(AdmissionState {
                window: RateWindow {
                    requests: VecDeque::with_capacity(rate_limit.max_requests),
                    window_ms: rate_limit.window_ms,
                    max_requests: rate_limit.max_requests,
                },
                circuit: CircuitState::default(),
            }),
            breaker: breaker.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AdmissionState> {
        // State updates never panic mid-way, so a poisoned lock still holds
        // consistent data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether a new upstream call may start at `now_ms`.
    ///
    /// An open breaker takes precedence over the window count.
    pub fn check_admission(&self, now_ms: u64) -> Admission {
        let mut state = self.lock();
        state.window.prune(now_ms);

        let (mut circuit, decision) = state.circuit.on_admission(now_ms, &self.breaker);

        let admission = match decision {
            CircuitDecision::Deny {
                retry_after_ms,
                reason,
            } => Admission::deny(retry_after_ms, reason),
            CircuitDecision::Allow => {
                if state.window.requests.len() >= state.window.max_requests {
                    // The probe was not actually sent; keep it available.
                    if let CircuitPhase::HalfOpen { .. } = circuit.phase {
                        circuit.phase = CircuitPhase::HalfOpen {
                            probe_started_at_ms: None,
                        };
                    }
                    Admission::deny(state.window.base_wait_ms(now_ms), RateLimitReason::Window)
                } else {
                    Admission::allow()
                }
            }
        };

        if circuit.phase.as_str() != state.circuit.phase.as_str() {
            tracing::info!(
                from = state.circuit.phase.as_str(),
                to = circuit.phase.as_str(),
                "Circuit breaker transition"
            );
        }
        state.circuit = circuit;

        if let Some(reason) = admission.reason {
            metrics::record_admission_denied(reason.as_str());
        }
        admission
    }

    /// Record a resolved upstream attempt at `now_ms`.
    pub fn record_attempt(&self, success: bool, now_ms: u64) {
        let mut state = self.lock();
        state.window.requests.push_back(now_ms);

        let before = state.circuit.phase;
        state.circuit = if success {
            state.circuit.on_success()
        } else {
            state.circuit.on_failure(now_ms, &self.breaker)
        };

        let after = state.circuit.phase;
        if after == CircuitPhase::Open && before != CircuitPhase::Open {
            tracing::warn!(
                consecutive_failures = state.circuit.consecutive_failures,
                reset_timeout_ms = self.breaker.reset_timeout_ms,
                "Circuit breaker opened"
            );
        } else if after == CircuitPhase::Closed && before != CircuitPhase::Closed {
            tracing::info!(
                consecutive_failures = state.circuit.consecutive_failures,
                "Circuit breaker closed"
            );
        }
        metrics::record_circuit_open(after == CircuitPhase::Open);
    }

    /// Failure-aware wait estimate for UI/telemetry:
    /// `base_wait * backoff_multiplier ^ consecutive_failures`.
    ///
    /// Returns 0 while the breaker is open; use the admission retry hint then.
    pub fn next_available_delay_ms(&self, now_ms: u64) -> u64 {
        let mut state = self.lock();
        state.window.prune(now_ms);
        if state.circuit.is_open() {
            return 0;
        }
        failure_backoff(
            state.window.base_wait_ms(now_ms),
            self.breaker.backoff_multiplier,
            state.circuit.consecutive_failures,
        )
    }

    pub fn window_ms(&self) -> u64 {
        self.lock().window.window_ms
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.lock().circuit
    }

    pub fn snapshot(&self, now_ms: u64) -> AdmissionSnapshot {
        let next_available_delay_ms = self.next_available_delay_ms(now_ms);
        let state = self.lock();
        let open_remaining_ms = if state.circuit.is_open() {
            let elapsed = now_ms.saturating_sub(state.circuit.last_failure_at_ms.unwrap_or(now_ms));
            Some(self.breaker.reset_timeout_ms.saturating_sub(elapsed))
        } else {
            None
        };
        AdmissionSnapshot {
            window_ms: state.window.window_ms,
            max_requests: state.window.max_requests,
            requests_in_window: state.window.requests.len(),
            circuit_phase: state.circuit.phase.as_str(),
            consecutive_failures: state.circuit.consecutive_failures,
            failure_threshold: self.breaker.failure_threshold,
            open_remaining_ms,
            next_available_delay_ms,
        }
    }
}
