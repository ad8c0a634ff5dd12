//! Application state for the validation server.

use std::sync::Arc;

use qvet_core::Validator;

use crate::config::{Config, ServerConfig};
use crate::metrics::Metrics;

/// Shared application state. Read-only after start-up.
pub struct AppState {
    /// The validation pipeline.
    pub validator: Arc<Validator>,
    /// Metrics handle.
    pub metrics: Metrics,
    /// HTTP settings (deadline, body limit, CORS).
    pub server: ServerConfig,
}

impl AppState {
    /// Build the pipeline described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let validator = if config.sandbox.circuit_library {
            Validator::new()
        } else {
            Validator::without_circuit_library()
        };
        let validator = validator
            .with_limits(config.sandbox.limits())
            .with_extraction(config.sandbox.extraction)
            .with_catalog(config.backends.clone());

        Self {
            validator: Arc::new(validator),
            metrics: Metrics::new(),
            server: config.server.clone(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
