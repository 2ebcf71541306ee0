//! route-balancer
//!
//! An HTTP load balancer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ http server ──▶ dispatcher ──▶ route table ──▶ backend router
//!                                │                                 │
//!                                │                       selection policy
//!                                │                                 ▼
//!                                │                  backend (slot pool, liveness)
//!                                ▼                                 │
//!                        retry policy ◀── transport ◀──────────────┘
//!                                                                       ──▶ Backend
//!     Background: health monitor (TCP probes), stats reporter (pool gauges)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use route_balancer::config::{load_config, BalancerConfig};
use route_balancer::lifecycle::{shutdown_signal, Shutdown};
use route_balancer::net::tls::load_tls_config;
use route_balancer::observability::{init_logging, metrics};
use route_balancer::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "route-balancer", version, about = "HTTP load balancer with path and header routing")]
struct Cli {
    /// Configuration file (.json or .toml). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "route-balancer starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routers = config.routers.len(),
        tls = config.listener.tls.is_some(),
        retry_policy = ?config.retries.policy,
        max_retries = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config);

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(bind_address.parse()?, rustls, shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
