//! qvet Validation Pipeline
//!
//! Takes untrusted circuit source code and returns a [`ValidationVerdict`]:
//! whether the code parses, whether it safely produces exactly one circuit,
//! and if so that circuit's structural metrics.
//!
//! # Stages
//!
//! 1. **Fingerprint**: SHA-256 of the submitted bytes, always reported.
//! 2. **Syntax gate**: parse without evaluating anything.
//! 3. **Sandboxed execution**: run the script against the capability allow-list.
//! 4. **Extraction**: find the circuit among the top-level bindings.
//! 5. **Analysis**: qubits, depth, gate histogram, execution estimate.
//! 6. **Compatibility**: warnings against the target backend's profile.
//!
//! Each failure short-circuits into an invalid verdict with one error.
//!
//! # Example
//!
//! ```rust
//! use qvet_core::{ValidationRequest, Validator};
//!
//! let code = "from qiskit import QuantumCircuit\n\
//!             qc = QuantumCircuit(2, 2)\n\
//!             qc.h(0)\n\
//!             qc.cx(0, 1)\n\
//!             qc.measure([0, 1], [0, 1])\n";
//!
//! let report = Validator::new().validate(&ValidationRequest::new(code), None);
//! let verdict = report.verdict;
//! assert!(verdict.valid);
//! assert_eq!(verdict.qubits, 2);
//! assert_eq!(verdict.gate_types["cx"], 1);
//! assert_eq!(verdict.circuit_hash.len(), 64);
//! ```

pub mod analyze;
pub mod compat;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod validator;
pub mod verdict;

pub use analyze::{CircuitAnalysis, analyze, estimate_execution_time};
pub use compat::{BackendCatalog, BackendProfile, DEFAULT_MAX_QUBITS};
pub use error::{ValidationError, ValidationResult};
pub use extract::{ExtractionPolicy, extract_circuit};
pub use fingerprint::fingerprint;
pub use validator::{DEGRADED_WARNING, Outcome, ValidationReport, Validator};
pub use verdict::{
    DEFAULT_OPTIMIZATION_LEVEL, GateHistogram, OPTIMIZATION_LEVELS, ValidationRequest,
    ValidationVerdict,
};

// The script language is part of this crate's public surface.
pub use qvet_script::{ErrorKind, ExecutionLimits};
