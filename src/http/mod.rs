//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, body limit)
//!     → security::pacing (endpoint-wide pacing guard)
//!     → summarize.rs (parse body, If-None-Match, call SummaryService)
//!     → response.rs (error taxonomy → status, Retry-After)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod summarize;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
pub use summarize::X_CACHE;
