//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed unhealthy, calls fail fast
//! - Half-Open: cooldown elapsed, a single probe call is let through
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= threshold
//! Open → Half-Open: now - last_failure >= reset_timeout (checked on admission)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! There is no timer. Every transition is a pure function of
//! `(state, now_ms)`, recomputed when admission is checked.

use crate::config::CircuitBreakerConfig;
use crate::error::RateLimitReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPhase {
    Closed,
    Open,
    /// `probe_started_at_ms` is set once the single probe has been admitted.
    HalfOpen { probe_started_at_ms: Option<u64> },
}

impl CircuitPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitPhase::Closed => "closed",
            CircuitPhase::Open => "open",
            CircuitPhase::HalfOpen { .. } => "half_open",
        }
    }
}

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitDecision {
    Allow,
    Deny {
        retry_after_ms: u64,
        reason: RateLimitReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitState {
    pub consecutive_failures: u32,
    pub last_failure_at_ms: Option<u64>,
    pub phase: CircuitPhase,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_failure_at_ms: None,
            phase: CircuitPhase::Closed,
        }
    }
}

impl CircuitState {
    pub fn is_open(&self) -> bool {
        self.phase == CircuitPhase::Open
    }

    /// Evaluate an admission request at `now_ms`.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and admits
    /// exactly one probe. A probe that never reports back stops blocking
    /// after another `reset_timeout_ms`.
    pub fn on_admission(
        self,
        now_ms: u64,
        policy: &CircuitBreakerConfig,
    ) -> (CircuitState, CircuitDecision) {
        match self.phase {
            CircuitPhase::Closed => (self, CircuitDecision::Allow),
            CircuitPhase::Open => {
                let elapsed = now_ms.saturating_sub(self.last_failure_at_ms.unwrap_or(now_ms));
                if elapsed < policy.reset_timeout_ms {
                    let decision = CircuitDecision::Deny {
                        retry_after_ms: policy.reset_timeout_ms - elapsed,
                        reason: RateLimitReason::CircuitOpen,
                    };
                    (self, decision)
                } else {
                    let next = CircuitState {
                        phase: CircuitPhase::HalfOpen {
                            probe_started_at_ms: Some(now_ms),
                        },
                        ..self
                    };
                    (next, CircuitDecision::Allow)
                }
            }
            CircuitPhase::HalfOpen {
                probe_started_at_ms: Some(started),
            } => {
                let elapsed = now_ms.saturating_sub(started);
                if elapsed < policy.reset_timeout_ms {
                    let decision = CircuitDecision::Deny {
                        retry_after_ms: policy.reset_timeout_ms - elapsed,
                        reason: RateLimitReason::HalfOpenProbe,
                    };
                    (self, decision)
                } else {
                    let next = CircuitState {
                        phase: CircuitPhase::HalfOpen {
                            probe_started_at_ms: Some(now_ms),
                        },
                        ..self
                    };
                    (next, CircuitDecision::Allow)
                }
            }
            CircuitPhase::HalfOpen {
                probe_started_at_ms: None,
            } => {
                let next = CircuitState {
                    phase: CircuitPhase::HalfOpen {
                        probe_started_at_ms: Some(now_ms),
                    },
                    ..self
                };
                (next, CircuitDecision::Allow)
            }
        }
    }

    /// Record a successful call. The failure count decays by one; a successful
    /// probe, or a count that reaches zero, closes the breaker.
    pub fn on_success(self) -> CircuitState {
        let consecutive_failures = self.consecutive_failures.saturating_sub(1);
        let phase = match self.phase {
            CircuitPhase::HalfOpen { .. } => CircuitPhase::Closed,
            _ if consecutive_failures == 0 => CircuitPhase::Closed,
            phase => phase,
        };
        CircuitState {
            consecutive_failures,
            phase,
            ..self
        }
    }

    /// Record a failed call at `now_ms`.
    pub fn on_failure(self, now_ms: u64, policy: &CircuitBreakerConfig) -> CircuitState {
        let consecutive_failures = self.consecutive_failures.saturating_add(1);
        let phase = if consecutive_failures >= policy.failure_threshold {
            CircuitPhase::Open
        } else {
            match self.phase {
                // A failed probe always re-opens, regardless of the decayed count.
                CircuitPhase::HalfOpen { .. } => CircuitPhase::Open,
                phase => phase,
            }
        };
        CircuitState {
            consecutive_failures,
            last_failure_at_ms: Some(now_ms),
            phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
            backoff_multiplier: 1.5,
        }
    }

    fn opened_at(now_ms: u64) -> CircuitState {
        let p = policy();
        CircuitState::default()
            .on_failure(now_ms, &p)
            .on_failure(now_ms, &p)
            .on_failure(now_ms, &p)
    }

    #[test]
    fn test_opens_on_threshold() {
        let p = policy();
        let state = CircuitState::default().on_failure(0, &p).on_failure(10, &p);
        assert_eq!(state.phase, CircuitPhase::Closed);
        let state = state.on_failure(20, &p);
        assert!(state.is_open());
        assert_eq!(state.last_failure_at_ms, Some(20));
    }

    #[test]
    fn test_open_denies_with_remaining_cooldown() {
        let state = opened_at(1_000);
        let (state, decision) = state.on_admission(11_000, &policy());
        assert_eq!(
            decision,
            CircuitDecision::Deny {
                retry_after_ms: 20_000,
                reason: RateLimitReason::CircuitOpen
            }
        );
        assert!(state.is_open());
    }

    #[test]
    fn test_half_open_allows_single_probe() {
        let p = policy();
        let (state, decision) = opened_at(0).on_admission(30_000, &p);
        assert_eq!(decision, CircuitDecision::Allow);
        assert_eq!(
            state.phase,
            CircuitPhase::HalfOpen {
                probe_started_at_ms: Some(30_000)
            }
        );

        let (_, second) = state.on_admission(30_500, &p);
        assert_eq!(
            second,
            CircuitDecision::Deny {
                retry_after_ms: 29_500,
                reason: RateLimitReason::HalfOpenProbe
            }
        );
    }

    #[test]
    fn test_abandoned_probe_lease_expires() {
        let p = policy();
        let (state, _) = opened_at(0).on_admission(30_000, &p);
        let (_, decision) = state.on_admission(60_000, &p);
        assert_eq!(decision, CircuitDecision::Allow);
    }

    #[test]
    fn test_probe_success_closes() {
        let p = policy();
        let (state, _) = opened_at(0).on_admission(30_000, &p);
        let state = state.on_success();
        assert_eq!(state.phase, CircuitPhase::Closed);
        assert_eq!(state.consecutive_failures, 2);

        let state = state.on_success().on_success();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.on_success().consecutive_failures, 0);
    }

    #[test]
    fn test_probe_failure_reopens() {
        let p = policy();
        let (state, _) = opened_at(0).on_admission(30_000, &p);
        let state = state.on_failure(30_100, &p);
        assert!(state.is_open());
        let (_, decision) = state.on_admission(30_200, &p);
        assert_eq!(
            decision,
            CircuitDecision::Deny {
                retry_after_ms: 29_900,
                reason: RateLimitReason::CircuitOpen
            }
        );
    }

    #[test]
    fn test_success_decays_failure_count() {
        let p = policy();
        let state = CircuitState::default()
            .on_failure(0, &p)
            .on_failure(0, &p)
            .on_success();
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.phase, CircuitPhase::Closed);
        // One more failure reaches 2 again, still below threshold.
        assert!(!state.on_failure(5, &p).is_open());
    }
}
