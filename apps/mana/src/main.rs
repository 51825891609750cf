//! # MANA - Workshop Access Server
//!
//! The main binary for cohort-paced MANA assessments.
//!
//! This application provides:
//! - HTTP JSON API server (axum-based) for facilitators and participants
//! - CLI interface for roster and progression operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                apps/mana (THE BINARY)            │
//! │                                                  │
//! │    ┌─────────────┐          ┌─────────────┐      │
//! │    │     CLI     │          │  HTTP API   │      │
//! │    │   (clap)    │          │   (axum)    │      │
//! │    └──────┬──────┘          └──────┬──────┘      │
//! │           └────────────┬───────────┘             │
//! │                        ▼                         │
//! │                ┌───────────────┐                 │
//! │                │   mana-core   │                 │
//! │                │  (THE ENGINE) │                 │
//! │                └───────────────┘                 │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! mana init --title "Sulu Value Chain Assessment"
//! mana import -a 1 -i roster.csv
//! mana advance -a 1 -w workshop_2
//! mana server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // MANA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MANA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mana=info,mana_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = mana::cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = mana::cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the MANA startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ███╗ █████╗ ███╗   ██╗ █████╗
  ████╗ ████║██╔══██╗████╗  ██║██╔══██╗
  ██╔████╔██║███████║██╔██╗ ██║███████║
  ██║╚██╔╝██║██╔══██║██║╚██╗██║██╔══██║
  ██║ ╚═╝ ██║██║  ██║██║ ╚████║██║  ██║
  ╚═╝     ╚═╝╚═╝  ╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝

  Workshop Access Server v{}

  Cohort-paced • Audited • Resumable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
