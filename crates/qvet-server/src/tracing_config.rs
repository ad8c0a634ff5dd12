//! Tracing subscriber setup.
//!
//! Console output for development, JSON structured logging for production.
//! `RUST_LOG` takes precedence over the configured level when set.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::LoggingConfig;

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output (for development).
    Console,
    /// JSON structured logging (for production).
    Json,
}

impl FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(TracingFormat::Console),
            "json" => Ok(TracingFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter (e.g., "info", "debug", "qvet_core=trace").
    pub log_level: String,
    /// Output format (console or JSON).
    pub format: TracingFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: TracingFormat::Console,
        }
    }
}

impl From<&LoggingConfig> for TracingConfig {
    fn from(logging: &LoggingConfig) -> Self {
        Self {
            log_level: logging.level.clone(),
            format: logging.format.parse().unwrap_or(TracingFormat::Console),
        }
    }
}

/// Install the global tracing subscriber.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match config.format {
        TracingFormat::Console => fmt::layer().with_target(true).boxed(),
        TracingFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(format = ?config.format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format, TracingFormat::Console);
    }

    #[test]
    fn test_from_logging_config() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        };
        let config = TracingConfig::from(&logging);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.format, TracingFormat::Json);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("console".parse(), Ok(TracingFormat::Console));
        assert_eq!("json".parse(), Ok(TracingFormat::Json));
        assert!("xml".parse::<TracingFormat>().is_err());
    }
}
