//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the text-generation upstream:
//!     → circuit_breaker.rs (fail fast while open, single probe when half-open)
//!     → [sliding window check in governor::admission]
//!     → upstream call
//!     → circuit_breaker.rs (record outcome)
//!
//! backoff.rs: failure-aware delay estimates and pacing interval scaling
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream target, owned by the admission controller
//! - Breaker transitions are pure functions of (state, now); no timers
//! - No automatic retries: a rate-limited caller gets a retry hint instead

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{CircuitDecision, CircuitPhase, CircuitState};
