//! Card image gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──GET /images/{key}──▶ http ──▶ gateway ──▶ cache store (Redis / memory)
//!                                              │
//!                                              ▼ miss
//!                                   circuit breaker → limiter → origin fetcher ──▶ Origin
//!                                                               (timeouts, retries)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use card_image_gateway::config::load_config;
use card_image_gateway::lifecycle::startup;
use card_image_gateway::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "card-image-gateway", version, about = "Caching gateway for card images")]
struct Args {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("card-image-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "card-image-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.base_url,
        concurrency = config.concurrency.limit,
        "Configuration loaded"
    );

    match startup::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
