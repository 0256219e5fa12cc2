//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, resolve credential)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via ArcSwap with the HTTP layer
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps endpoint-level settings (pacing, limits, admin key)
//!     → governor settings stay as started (restart required)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A missing upstream credential is fatal before any listener binds

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, resolve_api_key, ConfigError, API_KEY_ENV};
pub use schema::{
    AdminConfig, CacheConfig, CircuitBreakerConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, PacingConfig, RateLimitConfig, SecurityConfig, TimeoutConfig,
    UpstreamConfig,
};
pub use watcher::ConfigWatcher;
