//! Health and readiness endpoints.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Server start, for uptime.
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the start time (call once at server startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

/// Response for `/` and `/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Response for `/health/ready`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    /// False when running in degraded mode.
    pub circuit_library: bool,
    pub version: String,
}

/// GET /health - Liveness. Always 200 while the process serves requests.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime_seconds(),
    })
}

/// GET /health/ready - Readiness for validation traffic.
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        ready: true,
        circuit_library: state.validator.has_circuit_library(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
