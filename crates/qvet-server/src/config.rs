//! Configuration management for the qvet server.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with QVET_ prefix)
//! 3. .env files
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use qvet_core::{BackendCatalog, ExecutionLimits, ExtractionPolicy};
use serde::{Deserialize, Serialize};

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sandbox capabilities and resource bounds
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Backend capability profiles
    #[serde(default)]
    pub backends: BackendCatalog,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_address")]
    pub address: String,

    /// Deadline for one validation request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Comma-separated allowed origins, or "*"
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Sandbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Whether scripts can construct circuits. When off, the server runs in
    /// degraded mode and returns placeholder analyses.
    #[serde(default = "default_true")]
    pub circuit_library: bool,

    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    #[serde(default = "default_max_collection_len")]
    pub max_collection_len: usize,

    /// Elements a script may allocate over its whole run.
    #[serde(default = "default_max_total_elements")]
    pub max_total_elements: usize,

    #[serde(default = "default_max_eval_depth")]
    pub max_eval_depth: usize,

    #[serde(default = "default_max_qubits")]
    pub max_qubits: u32,

    #[serde(default = "default_max_operations")]
    pub max_operations: usize,

    /// "strict" or "first_match"
    #[serde(default)]
    pub extraction: ExtractionPolicy,
}

// Default value functions
fn default_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MB
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_steps() -> u64 {
    ExecutionLimits::default().max_steps
}

fn default_max_call_depth() -> usize {
    ExecutionLimits::default().max_call_depth
}

fn default_max_collection_len() -> usize {
    ExecutionLimits::default().max_collection_len
}

fn default_max_total_elements() -> usize {
    ExecutionLimits::default().max_total_elements
}

fn default_max_eval_depth() -> usize {
    ExecutionLimits::default().max_eval_depth
}

fn default_max_qubits() -> u32 {
    ExecutionLimits::default().max_qubits
}

fn default_max_operations() -> usize {
    ExecutionLimits::default().max_operations
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout_seconds: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServerConfig {
    /// Deadline for one validation request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            circuit_library: true,
            max_steps: default_max_steps(),
            max_call_depth: default_max_call_depth(),
            max_collection_len: default_max_collection_len(),
            max_total_elements: default_max_total_elements(),
            max_eval_depth: default_max_eval_depth(),
            max_qubits: default_max_qubits(),
            max_operations: default_max_operations(),
            extraction: ExtractionPolicy::default(),
        }
    }
}

impl SandboxConfig {
    /// Interpreter bounds for each execution.
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_steps: self.max_steps,
            max_call_depth: self.max_call_depth,
            max_collection_len: self.max_collection_len,
            max_total_elements: self.max_total_elements,
            max_eval_depth: self.max_eval_depth,
            max_qubits: self.max_qubits,
            max_operations: self.max_operations,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml_ng::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load .env file if it exists
    /// 2. Load from file if provided, else defaults
    /// 3. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        let config = config.merge_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    ///
    /// Only variables present in `lookup` override the file-loaded (or
    /// default) values. A present but unparsable value is an error.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(v) = lookup("QVET_ADDRESS") {
            self.server.address = v;
        }
        if let Some(v) = lookup("QVET_REQUEST_TIMEOUT") {
            self.server.request_timeout_seconds = parse_var("QVET_REQUEST_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_BODY_BYTES") {
            self.server.max_body_bytes = parse_var("QVET_MAX_BODY_BYTES", &v)?;
        }
        if let Some(v) = lookup("QVET_CORS_ORIGINS") {
            self.server.cors_origins = v;
        }

        // Logging
        if let Some(v) = lookup("QVET_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("QVET_LOG_FORMAT") {
            self.logging.format = v;
        }

        // Sandbox
        if let Some(v) = lookup("QVET_CIRCUIT_LIBRARY") {
            self.sandbox.circuit_library = parse_var("QVET_CIRCUIT_LIBRARY", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_STEPS") {
            self.sandbox.max_steps = parse_var("QVET_MAX_STEPS", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_CALL_DEPTH") {
            self.sandbox.max_call_depth = parse_var("QVET_MAX_CALL_DEPTH", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_COLLECTION_LEN") {
            self.sandbox.max_collection_len = parse_var("QVET_MAX_COLLECTION_LEN", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_TOTAL_ELEMENTS") {
            self.sandbox.max_total_elements = parse_var("QVET_MAX_TOTAL_ELEMENTS", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_EVAL_DEPTH") {
            self.sandbox.max_eval_depth = parse_var("QVET_MAX_EVAL_DEPTH", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_QUBITS") {
            self.sandbox.max_qubits = parse_var("QVET_MAX_QUBITS", &v)?;
        }
        if let Some(v) = lookup("QVET_MAX_OPERATIONS") {
            self.sandbox.max_operations = parse_var("QVET_MAX_OPERATIONS", &v)?;
        }
        if let Some(v) = lookup("QVET_EXTRACTION") {
            self.sandbox.extraction = match v.as_str() {
                "strict" => ExtractionPolicy::Strict,
                "first_match" => ExtractionPolicy::FirstMatch,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid value for QVET_EXTRACTION: {other}"
                    )));
                }
            };
        }

        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_address()?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {other}"
                )));
            }
        }

        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {other}"
                )));
            }
        }

        let nonzero = [
            ("request_timeout_seconds", self.server.request_timeout_seconds == 0),
            ("max_body_bytes", self.server.max_body_bytes == 0),
            ("max_steps", self.sandbox.max_steps == 0),
            ("max_call_depth", self.sandbox.max_call_depth == 0),
            ("max_collection_len", self.sandbox.max_collection_len == 0),
            ("max_total_elements", self.sandbox.max_total_elements == 0),
            ("max_eval_depth", self.sandbox.max_eval_depth == 0),
            ("max_qubits", self.sandbox.max_qubits == 0),
            ("max_operations", self.sandbox.max_operations == 0),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be greater than 0"
            )));
        }

        if self.backends.default.max_qubits == 0 {
            return Err(ConfigError::ValidationError(
                "backends.default.max_qubits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the parsed server address.
    pub fn server_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server.address.parse().map_err(|_| {
            ConfigError::ValidationError(format!("Invalid server address: {}", self.server.address))
        })
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("Invalid value for {key}: {value}")))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
