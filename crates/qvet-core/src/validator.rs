//! The validation pipeline.
//!
//! Stages run in order and the first failure short-circuits:
//! fingerprint, syntax gate, sandboxed execution, extraction, analysis,
//! compatibility. Every outcome, including internal faults, becomes a
//! [`ValidationVerdict`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use qvet_script::{Capabilities, ExecutionLimits, Sandbox};
use tracing::{debug, error, info, instrument, warn};

use crate::analyze::{CircuitAnalysis, analyze};
use crate::compat::BackendCatalog;
use crate::error::{ValidationError, ValidationResult};
use crate::extract::{ExtractionPolicy, extract_circuit};
use crate::fingerprint::{self, fingerprint};
use crate::verdict::{ValidationRequest, ValidationVerdict};

/// Warning attached to every verdict produced without a circuit library.
pub const DEGRADED_WARNING: &str = "Circuit library not available - validation is limited";

/// Which path a validation ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Valid,
    SyntaxInvalid,
    ExecutionFailed,
    NoCircuit,
    MultipleCircuits,
    AnalysisFailed,
    Degraded,
    Unexpected,
}

impl Outcome {
    /// Every outcome, for pre-registering metric labels.
    pub const ALL: [Outcome; 8] = [
        Outcome::Valid,
        Outcome::SyntaxInvalid,
        Outcome::ExecutionFailed,
        Outcome::NoCircuit,
        Outcome::MultipleCircuits,
        Outcome::AnalysisFailed,
        Outcome::Degraded,
        Outcome::Unexpected,
    ];

    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Valid => "valid",
            Outcome::SyntaxInvalid => "syntax_invalid",
            Outcome::ExecutionFailed => "execution_failed",
            Outcome::NoCircuit => "no_circuit",
            Outcome::MultipleCircuits => "multiple_circuits",
            Outcome::AnalysisFailed => "analysis_failed",
            Outcome::Degraded => "degraded",
            Outcome::Unexpected => "unexpected",
        }
    }
}

impl From<&ValidationError> for Outcome {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::SyntaxInvalid { .. } => Outcome::SyntaxInvalid,
            ValidationError::ExecutionFailed { .. } => Outcome::ExecutionFailed,
            ValidationError::NoCircuitFound => Outcome::NoCircuit,
            ValidationError::MultipleCircuitsFound { .. } => Outcome::MultipleCircuits,
            ValidationError::AnalysisFailed(_) => Outcome::AnalysisFailed,
            ValidationError::Unexpected(_) => Outcome::Unexpected,
        }
    }
}

/// A verdict plus what the caller needs for metrics and status codes.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub verdict: ValidationVerdict,
    pub outcome: Outcome,
    /// Execution stopped because the caller's deadline passed.
    pub deadline_exceeded: bool,
    pub elapsed: Duration,
}

/// Result of the stages after fingerprinting, on success.
struct Accepted {
    analysis: CircuitAnalysis,
    warnings: Vec<String>,
    degraded: bool,
}

/// Validates submissions against a fixed capability set and backend catalog.
///
/// Immutable after construction; share it behind an `Arc` across requests.
#[derive(Debug, Clone)]
pub struct Validator {
    sandbox: Sandbox,
    catalog: BackendCatalog,
    extraction: ExtractionPolicy,
}

impl Validator {
    /// Standard capabilities, default limits, default catalog, strict extraction.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::standard())
    }

    /// A validator built without the circuit-construction library.
    ///
    /// Submissions are still syntax-checked, then accepted with placeholder
    /// figures and [`DEGRADED_WARNING`].
    pub fn without_circuit_library() -> Self {
        Self::with_capabilities(Capabilities::without_circuit_library())
    }

    fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            sandbox: Sandbox::new(Arc::new(capabilities), ExecutionLimits::default()),
            catalog: BackendCatalog::default(),
            extraction: ExtractionPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: BackendCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.sandbox = Sandbox::new(Arc::new(self.sandbox.capabilities().clone()), limits);
        self
    }

    #[must_use]
    pub fn with_extraction(mut self, policy: ExtractionPolicy) -> Self {
        self.extraction = policy;
        self
    }

    pub fn has_circuit_library(&self) -> bool {
        self.sandbox.capabilities().has_circuit_library()
    }

    pub fn catalog(&self) -> &BackendCatalog {
        &self.catalog
    }

    pub fn limits(&self) -> &ExecutionLimits {
        self.sandbox.limits()
    }

    pub fn extraction(&self) -> ExtractionPolicy {
        self.extraction
    }

    /// Validate one submission.
    ///
    /// `deadline` bounds sandboxed execution; past it the script is stopped
    /// and the report has `deadline_exceeded` set.
    #[instrument(name = "validate", skip_all, fields(hash))]
    pub fn validate(
        &self,
        request: &ValidationRequest,
        deadline: Option<Instant>,
    ) -> ValidationReport {
        let started = Instant::now();
        let circuit_hash = fingerprint(&request.code);
        let short = fingerprint::short(&circuit_hash);
        tracing::Span::current().record("hash", short);
        info!("Validating circuit with hash: {short}...");

        let (verdict, outcome, deadline_exceeded) = match self.run(request, deadline) {
            Ok(accepted) => {
                let outcome = if accepted.degraded {
                    Outcome::Degraded
                } else {
                    Outcome::Valid
                };
                info!(
                    qubits = accepted.analysis.qubits,
                    depth = accepted.analysis.depth,
                    gates = accepted.analysis.gates,
                    warnings = accepted.warnings.len(),
                    "Circuit validated successfully"
                );
                let verdict =
                    ValidationVerdict::accepted(circuit_hash, accepted.analysis, accepted.warnings);
                (verdict, outcome, false)
            }
            Err(err) => {
                match &err {
                    ValidationError::Unexpected(_) | ValidationError::AnalysisFailed(_) => {
                        error!(error = %err, "Validation failed");
                    }
                    _ => info!(error = %err, "Circuit rejected"),
                }
                let verdict = ValidationVerdict::rejected(circuit_hash, &err);
                (verdict, Outcome::from(&err), err.is_deadline())
            }
        };

        ValidationReport {
            verdict,
            outcome,
            deadline_exceeded,
            elapsed: started.elapsed(),
        }
    }

    fn run(
        &self,
        request: &ValidationRequest,
        deadline: Option<Instant>,
    ) -> ValidationResult<Accepted> {
        let program = qvet_script::parse(&request.code)?;
        debug!(statements = program.body.len(), "Syntax check passed");

        if !self.has_circuit_library() {
            warn!("Circuit library not available, returning placeholder analysis");
            return Ok(Accepted {
                analysis: CircuitAnalysis::placeholder(),
                warnings: vec![DEGRADED_WARNING.to_string()],
                degraded: true,
            });
        }

        let execution = catch_unwind(AssertUnwindSafe(|| self.sandbox.execute(&program, deadline)))
            .map_err(|_| ValidationError::Unexpected("sandbox panicked".to_string()))??;
        debug!(steps = execution.steps(), "Circuit code executed");
        if !execution.stdout().is_empty() {
            debug!(stdout = execution.stdout(), "Captured script output");
        }

        let circuit = extract_circuit(execution.bindings(), self.extraction)?;
        let circuit = circuit.borrow();
        debug!(name = circuit.name(), "Found circuit object");

        let analysis = analyze(&*circuit)?;
        let warnings = self.catalog.check(&analysis, request.backend());
        for warning in &warnings {
            warn!(backend = request.backend(), "{warning}");
        }

        Ok(Accepted {
            analysis,
            warnings,
            degraded: false,
        })
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL: &str = "from qiskit import QuantumCircuit\n\
                        qc = QuantumCircuit(2, 2)\n\
                        qc.h(0)\n\
                        qc.cx(0, 1)\n\
                        qc.measure([0, 1], [0, 1])\n";

    #[test]
    fn test_bell_is_valid() {
        let report = Validator::new().validate(&ValidationRequest::new(BELL), None);
        assert_eq!(report.outcome, Outcome::Valid);
        assert!(!report.deadline_exceeded);
        let verdict = report.verdict;
        assert!(verdict.valid);
        assert_eq!(verdict.qubits, 2);
        assert_eq!(verdict.gates, 3);
        assert_eq!(verdict.depth, 3);
        assert!(verdict.errors.is_empty());
    }

    #[test]
    fn test_outcome_labels_are_distinct() {
        let labels: std::collections::BTreeSet<_> = Outcome::ALL.iter().map(|o| o.as_str()).collect();
        assert_eq!(labels.len(), Outcome::ALL.len());
    }

    #[test]
    fn test_degraded_mode() {
        let validator = Validator::without_circuit_library();
        assert!(!validator.has_circuit_library());

        let report = validator.validate(&ValidationRequest::new(BELL), None);
        assert_eq!(report.outcome, Outcome::Degraded);
        assert!(report.verdict.valid);
        assert_eq!(report.verdict.depth, 10);
        assert_eq!(report.verdict.warnings, vec![DEGRADED_WARNING]);

        // The syntax gate still applies.
        let report = validator.validate(&ValidationRequest::new("qc = (\n"), None);
        assert_eq!(report.outcome, Outcome::SyntaxInvalid);
        assert!(!report.verdict.valid);
    }

    #[test]
    fn test_deadline_is_reported() {
        let request = ValidationRequest::new("while True:\n    pass\n");
        let report = Validator::new().validate(&request, Some(Instant::now()));
        assert_eq!(report.outcome, Outcome::ExecutionFailed);
        assert!(report.deadline_exceeded);
        assert_eq!(
            report.verdict.errors,
            vec!["Circuit creation failed: TimeoutError: execution deadline exceeded"]
        );
    }

    #[test]
    fn test_step_budget_is_not_a_deadline() {
        let limits = ExecutionLimits {
            max_steps: 1_000,
            ..ExecutionLimits::default()
        };
        let validator = Validator::new().with_limits(limits);
        assert_eq!(validator.limits().max_steps, 1_000);

        let report = validator.validate(&ValidationRequest::new("while True:\n    pass\n"), None);
        assert_eq!(report.outcome, Outcome::ExecutionFailed);
        assert!(!report.deadline_exceeded);
    }

    #[test]
    fn test_first_match_policy() {
        let code = "a = QuantumCircuit(1)\nb = QuantumCircuit(3)\n";
        let strict = Validator::new().validate(&ValidationRequest::new(code), None);
        assert_eq!(strict.outcome, Outcome::MultipleCircuits);

        let lenient = Validator::new()
            .with_extraction(ExtractionPolicy::FirstMatch)
            .validate(&ValidationRequest::new(code), None);
        assert_eq!(lenient.outcome, Outcome::Valid);
        assert_eq!(lenient.verdict.qubits, 1);
    }
}
