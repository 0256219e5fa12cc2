//! Summary gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌──────────────────────────────────────────────┐
//!     POST /api/summarize   │                SUMMARY GATEWAY               │
//!     ──────────────────────┼─▶ http ─▶ pacing ─▶ summarize ─▶ governor   │
//!                           │                                   │  │  │    │
//!                           │                  fingerprint ◀────┘  │  │    │
//!                           │                  cache ◀─────────────┘  │    │
//!                           │                  admission + breaker ◀──┘    │
//!                           │                           │                  │
//!     ◀─────────────────────┼── ETag / X-Cache ◀─────── upstream ──────────┼──▶ Gemini
//!                           │                                              │
//!                           │  config (hot reload) · observability · admin │
//!                           └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use summary_gateway::lifecycle;

#[derive(Parser)]
#[command(name = "summary-gateway", version)]
#[command(about = "Governed email summarization gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match lifecycle::start(&cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            eprintln!("summary-gateway: {e}");
            ExitCode::FAILURE
        }
    }
}
