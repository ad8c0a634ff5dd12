//! Prometheus metrics for the validation service.
//!
//! - Validations by outcome
//! - Validation duration
//! - Requests that hit the deadline

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec,
};
use qvet_core::Outcome;

lazy_static! {
    /// Counter for finished validations, labeled by outcome
    pub static ref VALIDATIONS: IntCounterVec = register_int_counter_vec!(
        "qvet_validations_total",
        "Total number of validations by outcome",
        &["outcome"]
    )
    .expect("qvet_validations_total registers once");

    /// Histogram for validation duration in milliseconds
    pub static ref VALIDATION_DURATION: Histogram = register_histogram!(
        "qvet_validation_duration_milliseconds",
        "Validation pipeline duration in milliseconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0, 5000.0, 30000.0]
    )
    .expect("qvet_validation_duration_milliseconds registers once");

    /// Counter for validations stopped by the request deadline
    pub static ref VALIDATION_TIMEOUTS: IntCounter = register_int_counter!(
        "qvet_validation_timeouts_total",
        "Total number of validations that exceeded the request deadline"
    )
    .expect("qvet_validation_timeouts_total registers once");
}

/// Convenience handle over the global metrics.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    /// Create a handle and pre-register every outcome label at zero.
    pub fn new() -> Self {
        for outcome in Outcome::ALL {
            VALIDATIONS.with_label_values(&[outcome.as_str()]);
        }
        Self
    }

    /// Record a finished validation.
    pub fn record_validation(&self, outcome: Outcome, elapsed: Duration) {
        VALIDATIONS.with_label_values(&[outcome.as_str()]).inc();
        VALIDATION_DURATION.observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Record a validation that ran past its deadline.
    pub fn record_timeout(&self) {
        VALIDATION_TIMEOUTS.inc();
    }

    /// Current count for one outcome.
    pub fn validations(&self, outcome: Outcome) -> u64 {
        VALIDATIONS.with_label_values(&[outcome.as_str()]).get()
    }

    /// Get current metrics as Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
