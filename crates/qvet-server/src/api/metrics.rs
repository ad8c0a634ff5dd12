//! Prometheus scrape endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// GET /metrics - Prometheus text format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.export() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to export metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to export metrics".to_string(),
            )
                .into_response()
        }
    }
}
