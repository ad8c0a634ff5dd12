//! Request and verdict records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyze::CircuitAnalysis;
use crate::error::ValidationError;

/// Gate name to occurrence count.
pub type GateHistogram = BTreeMap<String, usize>;

/// Optimization level assumed when a request omits it.
pub const DEFAULT_OPTIMIZATION_LEVEL: i64 = 1;

/// Accepted optimization levels.
pub const OPTIMIZATION_LEVELS: std::ops::RangeInclusive<i64> = 0..=3;

fn default_optimization_level() -> i64 {
    DEFAULT_OPTIMIZATION_LEVEL
}

/// One submission to validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Script source.
    pub code: String,
    /// Target backend identifier, free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_name: Option<String>,
    /// Transpiler optimization level the caller intends to use.
    #[serde(default = "default_optimization_level")]
    pub optimization_level: i64,
}

impl ValidationRequest {
    /// A request for `code` with no backend and the default optimization level.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            backend_name: None,
            optimization_level: DEFAULT_OPTIMIZATION_LEVEL,
        }
    }

    /// Target a backend.
    #[must_use]
    pub fn with_backend(mut self, backend_name: impl Into<String>) -> Self {
        self.backend_name = Some(backend_name.into());
        self
    }

    /// Set the optimization level.
    #[must_use]
    pub fn with_optimization_level(mut self, level: i64) -> Self {
        self.optimization_level = level;
        self
    }

    /// Backend name, treating an empty string as absent.
    pub fn backend(&self) -> Option<&str> {
        self.backend_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Result of validating one submission.
///
/// `circuit_hash` is always set. An invalid verdict carries exactly the
/// errors and zeroed metrics; a valid one carries no errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub circuit_hash: String,
    #[serde(default)]
    pub depth: usize,
    #[serde(default)]
    pub qubits: usize,
    #[serde(default)]
    pub gates: usize,
    #[serde(default)]
    pub gate_types: GateHistogram,
    #[serde(default)]
    pub estimated_execution_time: f64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationVerdict {
    /// A rejected submission.
    pub fn rejected(circuit_hash: String, error: &ValidationError) -> Self {
        Self {
            valid: false,
            circuit_hash,
            depth: 0,
            qubits: 0,
            gates: 0,
            gate_types: GateHistogram::new(),
            estimated_execution_time: 0.0,
            errors: vec![error.to_string()],
            warnings: Vec::new(),
        }
    }

    /// An accepted submission with its analysis and any warnings.
    pub fn accepted(
        circuit_hash: String,
        analysis: CircuitAnalysis,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            valid: true,
            circuit_hash,
            depth: analysis.depth,
            qubits: analysis.qubits,
            gates: analysis.gates,
            gate_types: analysis.gate_types,
            estimated_execution_time: analysis.estimated_execution_time,
            errors: Vec::new(),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: ValidationRequest = serde_json::from_str(r#"{"code": "x = 1"}"#).unwrap();
        assert_eq!(request.code, "x = 1");
        assert_eq!(request.backend_name, None);
        assert_eq!(request.optimization_level, 1);
    }

    #[test]
    fn test_empty_backend_is_absent() {
        let request = ValidationRequest::new("x = 1").with_backend("");
        assert_eq!(request.backend(), None);
        let request = ValidationRequest::new("x = 1").with_backend("ibm_brisbane");
        assert_eq!(request.backend(), Some("ibm_brisbane"));
    }

    #[test]
    fn test_rejected_verdict_is_zeroed() {
        let verdict = ValidationVerdict::rejected("abc".into(), &ValidationError::NoCircuitFound);
        assert!(!verdict.valid);
        assert_eq!(verdict.circuit_hash, "abc");
        assert_eq!(verdict.depth, 0);
        assert!(verdict.gate_types.is_empty());
        assert_eq!(verdict.errors, vec!["No QuantumCircuit object found in code"]);
    }

    #[test]
    fn test_verdict_json_shape() {
        let verdict = ValidationVerdict::rejected("abc".into(), &ValidationError::NoCircuitFound);
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["gate_types"], serde_json::json!({}));
        assert_eq!(json["estimated_execution_time"], 0.0);
        assert_eq!(json["warnings"], serde_json::json!([]));
    }
}
