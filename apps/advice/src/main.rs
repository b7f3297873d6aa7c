//! # Advice Taker
//!
//! The main binary for the Advice Taker planner.
//!
//! This application provides:
//! - World loading (built-in scenario or TOML world files)
//! - CLI interface for deduction, planning and queries
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/advice (THE BINARY)          │
//! │                                              │
//! │   ┌─────────────┐        ┌──────────────┐    │
//! │   │    CLI      │        │ World loader │    │
//! │   │   (clap)    │        │    (toml)    │    │
//! │   └──────┬──────┘        └──────┬───────┘    │
//! │          └───────────┬──────────┘            │
//! │                      ▼                       │
//! │              ┌───────────────┐               │
//! │              │  advice-core  │               │
//! │              │  (THE LOGIC)  │               │
//! │              └───────────────┘               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Immediate conclusions in the built-in world
//! advice actions
//!
//! # Plan John's trip to the airport and apply it
//! advice plan --commit
//!
//! # Custom worlds
//! advice init -o world.toml
//! advice --world world.toml plan --goal garage
//! advice --world world.toml query "at(?thing, 885 Allardice Way)"
//! ```

use advice::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // ADVICE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ADVICE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "advice=info,advice_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  Advice Taker v{}

  Facts • Rules • Plans
"#,
        env!("CARGO_PKG_VERSION")
    );
}
