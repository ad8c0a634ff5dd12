//! qvet server - HTTP front end for circuit script validation.
//!
//! Callers post a circuit-building script and get back a verdict: whether the
//! script builds exactly one circuit, that circuit's shape, and warnings about
//! the target backend. Scripts run in the `qvet-script` sandbox on the
//! blocking pool, bounded by the request deadline.
//!
//! # Endpoints
//!
//! | Method | Path            | Purpose                         |
//! |--------|-----------------|---------------------------------|
//! | GET    | `/`, `/health`  | Liveness                        |
//! | GET    | `/health/ready` | Readiness and circuit library   |
//! | GET    | `/metrics`      | Prometheus text format          |
//! | POST   | `/validate`     | Validate a script               |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use qvet_server::{AppState, Config, create_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let state = Arc::new(AppState::from_config(&config));
//!
//!     let app = create_router(state);
//!     let listener = tokio::net::TcpListener::bind(config.server_address()?).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod state;
pub mod tracing_config;

pub use config::{Config, ConfigError, LoggingConfig, SandboxConfig, ServerConfig};
pub use error::ApiError;
pub use metrics::Metrics;
pub use server::create_router;
pub use state::AppState;
pub use tracing_config::{TracingConfig, TracingFormat, init_tracing};
