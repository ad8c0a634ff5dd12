//! Validation error types.
//!
//! Every variant is a short-circuit path of the pipeline. None of them
//! escape [`crate::Validator::validate`]: each one is folded into the verdict
//! as its single error string, which is the variant's `Display` output.

use qvet_script::{ErrorKind, ScriptError, SyntaxError};
use thiserror::Error;

/// Result type for pipeline stages.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Why a submission was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The code does not parse.
    #[error("Python syntax error at line {line}: {message}")]
    SyntaxInvalid {
        /// 1-based line of the failure.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// The sandbox raised while running the code.
    #[error("Circuit creation failed: {kind}: {message}")]
    ExecutionFailed {
        /// Error category as seen by the script author.
        kind: ErrorKind,
        /// Error message.
        message: String,
    },

    /// Execution finished without binding a circuit.
    #[error("No QuantumCircuit object found in code")]
    NoCircuitFound,

    /// Execution bound more than one distinct circuit.
    #[error(
        "Multiple QuantumCircuit objects found in code ({}); exactly one is required",
        .names.join(", ")
    )]
    MultipleCircuitsFound {
        /// Binding names, one per distinct circuit, in binding order.
        names: Vec<String>,
    },

    /// The extracted circuit violates the shape contract.
    #[error("Circuit analysis failed: {0}")]
    AnalysisFailed(String),

    /// An internal fault; never caused by well-formed pipeline state.
    #[error("Unexpected error during validation: {0}")]
    Unexpected(String),
}

impl ValidationError {
    /// True for the sandbox giving up because the request deadline passed.
    pub fn is_deadline(&self) -> bool {
        matches!(
            self,
            ValidationError::ExecutionFailed {
                kind: ErrorKind::TimeoutError,
                message,
            } if message == qvet_script::DEADLINE_EXCEEDED
        )
    }
}

impl From<SyntaxError> for ValidationError {
    fn from(err: SyntaxError) -> Self {
        ValidationError::SyntaxInvalid {
            line: err.line,
            message: err.message,
        }
    }
}

impl From<ScriptError> for ValidationError {
    fn from(err: ScriptError) -> Self {
        match err.kind {
            ErrorKind::InternalError => ValidationError::Unexpected(err.message),
            kind => ValidationError::ExecutionFailed {
                kind,
                message: err.message,
            },
        }
    }
}

impl From<qvet_ir::IrError> for ValidationError {
    fn from(err: qvet_ir::IrError) -> Self {
        ValidationError::AnalysisFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_strings() {
        let err = ValidationError::SyntaxInvalid {
            line: 2,
            message: "'(' was never closed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Python syntax error at line 2: '(' was never closed"
        );

        let err = ValidationError::ExecutionFailed {
            kind: ErrorKind::CircuitError,
            message: "Index 5 out of range for size 2.".into(),
        };
        assert_eq!(
            err.to_string(),
            "Circuit creation failed: CircuitError: Index 5 out of range for size 2."
        );

        assert_eq!(
            ValidationError::NoCircuitFound.to_string(),
            "No QuantumCircuit object found in code"
        );

        let err = ValidationError::MultipleCircuitsFound {
            names: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "Multiple QuantumCircuit objects found in code (a, b); exactly one is required"
        );
    }

    #[test]
    fn test_internal_script_error_is_unexpected() {
        let err = ScriptError::new(ErrorKind::InternalError, "bad state");
        assert_eq!(
            ValidationError::from(err).to_string(),
            "Unexpected error during validation: bad state"
        );
    }

    #[test]
    fn test_deadline_detection() {
        let err = ValidationError::from(ScriptError::new(
            ErrorKind::TimeoutError,
            qvet_script::DEADLINE_EXCEEDED,
        ));
        assert!(err.is_deadline());

        let err = ValidationError::from(ScriptError::new(
            ErrorKind::TimeoutError,
            "step budget exhausted",
        ));
        assert!(!err.is_deadline());
    }
}
