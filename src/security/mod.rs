//! Endpoint-level protection.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → body limit (server.rs, DefaultBodyLimit)
//!     → pacing.rs (global minimum interval, multiplicative backoff)
//!     → summarize handler → governor
//! ```
//!
//! Per-fingerprint throughput is the governor's concern; this layer only sheds
//! bursts before they reach it.

pub mod pacing;

pub use pacing::{pacing_middleware, PacingGuard};
