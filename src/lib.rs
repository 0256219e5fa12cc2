//! Summary gateway library.
//!
//! An HTTP summarization endpoint in front of a rate-limited generative model,
//! governed by a fingerprinted response cache, a sliding admission window and
//! a circuit breaker.

pub mod admin;
pub mod clock;
pub mod config;
pub mod error;
pub mod governor;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod summarize;
pub mod upstream;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GatewayConfig;
pub use error::{GovernorError, GovernorResult, RateLimitReason};
pub use governor::{Freshness, Generation, GenerationRequest, Governor};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use summarize::{SummaryKind, SummaryService};
pub use upstream::{GenerationParams, TextGenerator, UpstreamError};
