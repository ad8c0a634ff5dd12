//! Circuit validation endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, extract::State};
use qvet_core::{OPTIMIZATION_LEVELS, ValidationRequest, ValidationVerdict};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /validate - Validate a circuit script.
///
/// Any request that passes boundary checks gets a 200 with a verdict, valid
/// or not. The pipeline runs on the blocking pool; past the request deadline
/// the caller gets a 504 instead.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidationRequest>,
) -> Result<Json<ValidationVerdict>, ApiError> {
    check_request(&req)?;
    debug!(
        code_bytes = req.code.len(),
        backend = req.backend(),
        optimization_level = req.optimization_level,
        "Validation request received"
    );

    let timeout = state.server.request_timeout();
    let deadline = Instant::now() + timeout;
    let validator = Arc::clone(&state.validator);
    let task = tokio::task::spawn_blocking(move || validator.validate(&req, Some(deadline)));

    let report = match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined?,
        Err(_) => {
            warn!(timeout_seconds = timeout.as_secs(), "Validation timed out");
            state.metrics.record_timeout();
            return Err(ApiError::Timeout(timeout));
        }
    };

    if report.deadline_exceeded {
        warn!(timeout_seconds = timeout.as_secs(), "Validation timed out");
        state.metrics.record_timeout();
        return Err(ApiError::Timeout(timeout));
    }

    state.metrics.record_validation(report.outcome, report.elapsed);
    Ok(Json(report.verdict))
}

fn check_request(req: &ValidationRequest) -> Result<(), ApiError> {
    if req.code.is_empty() {
        return Err(ApiError::InvalidRequest("code must not be empty".to_string()));
    }
    if !OPTIMIZATION_LEVELS.contains(&req.optimization_level) {
        return Err(ApiError::InvalidRequest(format!(
            "optimization_level must be between {} and {}, got {}",
            OPTIMIZATION_LEVELS.start(),
            OPTIMIZATION_LEVELS.end(),
            req.optimization_level
        )));
    }
    Ok(())
}
