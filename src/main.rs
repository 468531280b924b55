//! Identity-verification front door.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     FRONT DOOR                       │
//!                     │                                                      │
//!   Client Request    │  ┌────────┐  ┌──────────┐  ┌────────┐  ┌──────────┐  │
//!   ──────────────────┼─▶│ health │─▶│admission │─▶│ access │─▶│  locale  │  │
//!                     │  │  gate  │  │ (shed)   │  │  log   │  │          │  │
//!                     │  └────────┘  └──────────┘  └────────┘  └────┬─────┘  │
//!                     │                                             ▼        │
//!                     │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   Client Response   │  │ rewriter │◀──│ security │◀──│ dispatch         │  │
//!   ◀─────────────────┼──│ (origins)│   │ headers  │   │ local | forward ─┼──┼──▶ Writer
//!                     │  └──────────┘   └──────────┘   └──────────────────┘  │     Node
//!                     │                                                      │
//!                     │  Background: lag sampler, liveness notifier          │
//!                     │  Lifecycle:  startup → drain → crypto → storage      │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use frontdoor::config::{load_config, FrontdoorConfig};
use frontdoor::http::handlers;
use frontdoor::lifecycle::{launch, signals, Collaborators};
use frontdoor::observability::{logging, metrics};
use frontdoor::services::{storage, BcryptPool};

#[derive(Debug, Parser)]
#[command(name = "frontdoor", version, about = "Identity-verification front door")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply without one.
    #[arg(short, long, env = "FRONTDOOR_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("frontdoor: {e}");
                return ExitCode::from(1);
            }
        },
        None => FrontdoorConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "frontdoor starting");

    if cli.check {
        return match frontdoor::config::validate_config(&config) {
            Ok(()) => {
                tracing::info!("Configuration is valid");
                ExitCode::SUCCESS
            }
            Err(errors) => {
                for error in &errors {
                    tracing::error!(%error, "Invalid configuration");
                }
                ExitCode::from(1)
            }
        };
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let collaborators = Collaborators {
        storage: storage::from_config(&config.storage),
        crypto: Arc::new(BcryptPool::new(&config.crypto)),
    };

    let launched = match launch(config, collaborators, handlers::local_router()).await {
        Ok(launched) => launched,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::from(e.exit_code());
        }
    };

    let _signals = signals::install(launched.shutdown());

    match launched.serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server terminated with error");
            ExitCode::from(1)
        }
    }
}
