//! Managed certificate provisioner (v1)
//!
//! One endpoint, `POST /generate-cert`, provisions a provider-managed TLS
//! certificate for a domain and attaches it to an existing global HTTPS load
//! balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌──────────────────────────────────────────────────────┐
//!     POST /generate-cert   │                 CERT PROVISIONER                     │
//!     ──────────────────────┼─▶ http (axum) ──▶ provisioning::Provisioner          │
//!                           │                        │                             │
//!                           │         ┌──────────────┼──────────────┐              │
//!                           │         ▼              ▼              ▼              │
//!                           │   resilience::retry  resilience::  compute::        │
//!                           │   (mutations)        await_completion GceClient ─────┼──▶ Compute API
//!                           │                      (operations)                    │
//!                           │                                                      │
//!                           │  config · observability · lifecycle                  │
//!                           └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use lb_cert_provisioner::compute::GceClient;
use lb_cert_provisioner::config::load_config;
use lb_cert_provisioner::observability::{logging, metrics};
use lb_cert_provisioner::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "lb-cert-provisioner")]
#[command(about = "Provision managed TLS certificates onto Compute Engine HTTPS load balancers", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "CERT_PROVISIONER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.observability)?;

    tracing::info!("lb-cert-provisioner v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        operation_poll_attempts = config.provisioning.operation_poll.max_attempts,
        mutation_retry_attempts = config.provisioning.mutation_retry.attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let compute = Arc::new(GceClient::from_config(&config.gcp).await?);

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, compute);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
