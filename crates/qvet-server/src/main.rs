//! qvet server binary.
//!
//! # Configuration
//!
//! Settings come from an optional YAML file (`--config` or `QVET_CONFIG`),
//! then `QVET_*` environment variables, then command-line flags. A `.env`
//! file in the working directory is loaded first.
//!
//! # Usage
//!
//! ```bash
//! qvet-server --config config/qvet.yaml --address 127.0.0.1:8000
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use qvet_server::api::health::init_start_time;
use qvet_server::{AppState, Config, TracingConfig, create_router, init_tracing};

#[derive(Parser)]
#[command(name = "qvet-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "QVET_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configured one
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(address) = cli.address {
        config.server.address = address;
        config.validate()?;
    }

    init_tracing(&TracingConfig::from(&config.logging))?;
    init_start_time();

    let addr = config.server_address()?;
    let state = Arc::new(AppState::from_config(&config));
    if !state.validator.has_circuit_library() {
        warn!("Circuit library disabled; every request gets a placeholder verdict");
    }

    info!(
        timeout_seconds = config.server.request_timeout_seconds,
        max_body_bytes = config.server.max_body_bytes,
        backends = config.backends.profiles.len(),
        "Starting qvet server"
    );

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {addr}");
    info!("CORS origins: {}", config.server.cors_origins);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("qvet server shut down");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
