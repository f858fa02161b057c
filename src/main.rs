//! API Gateway
//!
//! A traffic-control gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                     API GATEWAY                      │
//!                          │                                                      │
//!     Client Request       │  ┌─────────┐    ┌──────────────┐    ┌─────────────┐  │
//!     ─────────────────────┼─▶│  http   │───▶│   routing    │───▶│   filters   │  │
//!                          │  │ server  │    │ route table  │    │ counter/ip/ │  │
//!                          │  └─────────┘    └──────▲───────┘    │ token/rate  │  │
//!                          │                        │            └──────┬──────┘  │
//!                          │                 ┌──────┴───────┐           │         │
//!                          │                 │  refresher   │           ▼         │
//!                          │                 │ route source │    ┌─────────────┐  │
//!     Client Response      │                 └──────────────┘    │   proxy     │  │
//!     ◀────────────────────┼─────────────────────────────────────│  forward    │◀─┼──── Backend
//!                          │                                     └─────────────┘  │
//!                          │  ┌────────────────────────────────────────────────┐  │
//!                          │  │             Cross-Cutting Concerns             │  │
//!                          │  │  config · observability · security · admin ·   │  │
//!                          │  │  lifecycle                                     │  │
//!                          │  └────────────────────────────────────────────────┘  │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::lifecycle::{shutdown_signal, Gateway};
use api_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "API gateway traffic-control core", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        route_source = ?config.route_source.kind,
        refresh_interval_secs = config.refresh.interval_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start Prometheus exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let handle = Gateway::new(config).start().await?;
    tracing::info!(address = %handle.address(), "Listening for connections");

    shutdown_signal().await;
    handle.shutdown().await;

    Ok(())
}
