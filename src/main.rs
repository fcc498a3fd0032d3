//! Order API service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ CorrelationIdLayer ─▶ error boundary ─▶ RequestLoggingLayer
//!                                                                   │
//!                                                                   ▼
//!                                                         router ─▶ handlers
//!                                                                   │
//!                                                                   ▼
//!                                         OrderService (order.create timing, events)
//!                                                                   │
//!                                                                   ▼
//!                                         OrderRepository (order.save/fetch timing)
//!
//!     Cross-cutting: config, structured logging, Prometheus request metrics,
//!     OpenTelemetry business metrics, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use order_observability::config::{load_config, load_default};
use order_observability::http::HttpServer;
use order_observability::lifecycle::signals::wait_for_signal;
use order_observability::lifecycle::startup::build_state;
use order_observability::lifecycle::{Shutdown, Telemetry};
use order_observability::observability::logging::init_logging;
use order_observability::observability::metrics::init_metrics;

#[derive(Parser)]
#[command(name = "order-observability")]
#[command(about = "Order API with request correlation and business telemetry", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_default()?,
    };

    init_logging(&config.observability);
    tracing::info!(
        service = %config.observability.service_name,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let telemetry = Telemetry::init(&config)?;

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        init_metrics(config.observability.metrics_address.parse()?);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, build_state(telemetry.registry.clone()));
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, stop).await?;

    telemetry.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
