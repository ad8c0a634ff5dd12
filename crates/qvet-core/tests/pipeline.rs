//! End-to-end pipeline tests: source text in, verdict out.

use qvet_core::{
    BackendCatalog, BackendProfile, Outcome, ValidationRequest, ValidationVerdict, Validator,
    fingerprint,
};

fn validate(code: &str) -> ValidationVerdict {
    Validator::new()
        .validate(&ValidationRequest::new(code), None)
        .verdict
}

fn assert_rejected(verdict: &ValidationVerdict) {
    assert!(!verdict.valid);
    assert_eq!(verdict.errors.len(), 1, "{:?}", verdict.errors);
    assert_eq!(verdict.depth, 0);
    assert_eq!(verdict.qubits, 0);
    assert_eq!(verdict.gates, 0);
    assert!(verdict.gate_types.is_empty());
    assert_eq!(verdict.estimated_execution_time, 0.0);
    assert!(verdict.warnings.is_empty());
}

const BELL: &str = r#"from qiskit import QuantumCircuit

qc = QuantumCircuit(2, 2)
qc.h(0)
qc.cx(0, 1)
qc.measure([0, 1], [0, 1])
"#;

#[test]
fn test_valid_round_trip() {
    let verdict = validate(BELL);
    assert!(verdict.valid);
    assert!(verdict.errors.is_empty());
    assert_eq!(verdict.qubits, 2);
    assert_eq!(verdict.gates, 3);
    assert_eq!(verdict.gate_types["h"], 1);
    assert_eq!(verdict.gate_types["cx"], 1);
    assert_eq!(verdict.gate_types["measure"], 1);
    assert!(verdict.depth >= 2);
    assert_eq!(
        verdict.estimated_execution_time,
        verdict.depth as f64 * 0.1 + verdict.gates as f64 * 0.01
    );
}

#[test]
fn test_hash_present_on_every_path() {
    for code in [
        BELL,
        "qc = QuantumCircuit(2\nqc.h(0)",
        "x = 1\n",
        "import os\n",
        "",
    ] {
        let verdict = validate(code);
        assert_eq!(verdict.circuit_hash, fingerprint(code));
        assert_eq!(verdict.circuit_hash.len(), 64);
    }
}

#[test]
fn test_syntax_error_fails_closed() {
    let verdict = validate("qc = QuantumCircuit(2\nqc.h(0)");
    assert_rejected(&verdict);
    assert!(
        verdict.errors[0].starts_with("Python syntax error at line 1:"),
        "{}",
        verdict.errors[0]
    );
}

#[test]
fn test_out_of_range_qubit_fails_closed() {
    let verdict = validate("from qiskit import QuantumCircuit\nqc = QuantumCircuit(2)\nqc.h(5)\n");
    assert_rejected(&verdict);
    assert!(verdict.errors[0].contains("Circuit creation failed"));
    assert!(
        verdict.errors[0].contains("Index 5 out of range for size 2."),
        "{}",
        verdict.errors[0]
    );
}

#[test]
fn test_no_circuit_detected() {
    let verdict = validate("x = 2 + 3\nprint(x * 7)\n");
    assert_rejected(&verdict);
    assert!(verdict.errors[0].contains("No QuantumCircuit"));
}

#[test]
fn test_multiple_circuits_rejected() {
    let verdict = validate("a = QuantumCircuit(1)\nb = QuantumCircuit(2)\n");
    assert_rejected(&verdict);
    assert_eq!(
        verdict.errors[0],
        "Multiple QuantumCircuit objects found in code (a, b); exactly one is required"
    );
}

#[test]
fn test_disallowed_capabilities_fail_closed() {
    for code in [
        "import os\nqc = QuantumCircuit(1)\n",
        "from subprocess import run\n",
        "f = open('/etc/passwd')\n",
        "qc = QuantumCircuit(1)\nqc.__class__\n",
        "eval('1')\n",
    ] {
        let verdict = validate(code);
        assert_rejected(&verdict);
        assert!(
            verdict.errors[0].starts_with("Circuit creation failed: "),
            "{code:?}: {}",
            verdict.errors[0]
        );
    }
}

#[test]
fn test_compatibility_warning_threshold() {
    let code = "from qiskit import QuantumCircuit\nqc = QuantumCircuit(130)\nqc.h(range(130))\n";

    let request = ValidationRequest::new(code).with_backend("ibm_brisbane");
    let verdict = Validator::new().validate(&request, None).verdict;
    assert!(verdict.valid);
    assert_eq!(verdict.qubits, 130);
    assert!(verdict.warnings.iter().any(|w| w.contains("130")));

    let verdict = validate(code);
    assert!(verdict.valid);
    assert!(verdict.warnings.is_empty());
}

#[test]
fn test_named_backend_profile() {
    let catalog = BackendCatalog::default().with_profile(
        "ibm_brisbane",
        BackendProfile {
            basis_gates: Some(vec!["ecr".into(), "rz".into(), "sx".into(), "x".into()]),
            ..BackendProfile::with_qubits(127)
        },
    );
    let request = ValidationRequest::new(BELL).with_backend("ibm_brisbane");
    let verdict = Validator::new()
        .with_catalog(catalog)
        .validate(&request, None)
        .verdict;
    assert!(verdict.valid);
    assert_eq!(
        verdict.warnings,
        vec!["Gates cx, h are not native on backend 'ibm_brisbane' and will require transpilation"]
    );
}

#[test]
fn test_idempotent() {
    let validator = Validator::new();
    for code in [BELL, "x = 1\n", "qc = QuantumCircuit(2\n"] {
        let request = ValidationRequest::new(code).with_backend("simulator");
        let first = validator.validate(&request, None);
        let second = validator.validate(&request, None);
        assert_eq!(first.verdict, second.verdict);
        assert_eq!(first.outcome, second.outcome);
    }
}

#[test]
fn test_default_circuit_names_do_not_leak_between_calls() {
    let code = "qc = QuantumCircuit(1)\nname = qc.name\nassert name == 'circuit-0'\n";
    let validator = Validator::new();
    assert!(validator.validate(&ValidationRequest::new(code), None).verdict.valid);
    assert!(validator.validate(&ValidationRequest::new(code), None).verdict.valid);
}

#[test]
fn test_resource_exhaustion_fails_closed() {
    let deep = "x = []\ny = []\nfor i in range(1000):\n    x = [x]\n    y = [y]\n";
    let cases = [
        ("s = f'{1:>99999999999}'\n".to_string(), "MemoryError"),
        ("s = f'{1.0:.99999999999f}'\n".to_string(), "ValueError"),
        ("s = ''.join(['a' * 1000000] * 1000000)\n".to_string(), "MemoryError"),
        (
            "l = []\nfor i in range(900000):\n    l.append([0] * 900000)\n".to_string(),
            "MemoryError",
        ),
        (format!("{deep}b = x == y\n"), "RecursionError"),
        (format!("{deep}print(x)\n"), "RecursionError"),
        ("x = 99999999999999999999\n".to_string(), "OverflowError"),
        ("x = [1, 2, 3][9223372036854775808::-1]\n".to_string(), "OverflowError"),
    ];
    for (code, kind) in cases {
        let verdict = validate(&code);
        assert_rejected(&verdict);
        let expected = format!("Circuit creation failed: {kind}: ");
        assert!(
            verdict.errors[0].starts_with(&expected),
            "{code:?}: {}",
            verdict.errors[0]
        );
    }
}

#[test]
fn test_long_expression_is_a_syntax_error() {
    let code = format!("from qiskit import QuantumCircuit\nx = 1{}\n", " + 1".repeat(20_000));
    let verdict = validate(&code);
    assert_rejected(&verdict);
    assert_eq!(
        verdict.errors[0],
        "Python syntax error at line 2: expression is too deeply nested"
    );
}

const GROVER_2_QUBIT: &str = r#"from qiskit import QuantumCircuit
import math

# Create a 2-qubit circuit for Grover's algorithm
qc = QuantumCircuit(2, 2)

# Initialize: Apply Hadamard to all qubits
qc.h([0, 1])

# Oracle: Mark the state |11>
qc.cz(0, 1)

# Diffusion operator (inversion about average)
qc.h([0, 1])
qc.z([0, 1])
qc.cz(0, 1)
qc.h([0, 1])

# Measure
qc.measure([0, 1], [0, 1])
"#;

const GROVER_3_QUBIT: &str = r#"from qiskit import QuantumCircuit

# Create a 3-qubit circuit for Grover's algorithm
qc = QuantumCircuit(3, 3)

# Initialize: Apply Hadamard to all qubits
qc.h([0, 1, 2])

# Oracle: Mark the state |101>
qc.x(1)  # Flip qubit 1
qc.h(2)
qc.ccx(0, 1, 2)  # Toffoli gate
qc.h(2)
qc.x(1)  # Flip back

# Diffusion operator
qc.h([0, 1, 2])
qc.x([0, 1, 2])
qc.h(2)
qc.ccx(0, 1, 2)
qc.h(2)
qc.x([0, 1, 2])
qc.h([0, 1, 2])

# Measure all qubits
qc.measure([0, 1, 2], [0, 1, 2])
"#;

const GROVER_4_QUBIT: &str = r#"from qiskit import QuantumCircuit

# Create a 4-qubit circuit (3 search qubits + 1 ancilla)
qc = QuantumCircuit(4, 3)

# Initialize search qubits in superposition
qc.h([0, 1, 2])

# Prepare ancilla in |-> state for phase kickback
qc.x(3)
qc.h(3)

num_iterations = 2

for _ in range(num_iterations):
    # Oracle: Mark the state |101>
    qc.x(1)
    qc.h(3)
    qc.ccx(0, 1, 3)
    qc.ccx(2, 3, 1)
    qc.h(3)
    qc.x(1)

    # Diffusion operator (inversion about average)
    qc.h([0, 1, 2])
    qc.x([0, 1, 2])
    qc.h(2)
    qc.ccx(0, 1, 2)
    qc.h(2)
    qc.x([0, 1, 2])
    qc.h([0, 1, 2])

# Measure search qubits
qc.measure([0, 1, 2], [0, 1, 2])
"#;

#[test]
fn test_grover_two_qubits() {
    let verdict = validate(GROVER_2_QUBIT);
    assert!(verdict.valid, "{:?}", verdict.errors);
    assert_eq!(verdict.qubits, 2);
    assert_eq!(verdict.gates, 11);
    assert_eq!(verdict.depth, 7);
    assert_eq!(verdict.gate_types["h"], 6);
    assert_eq!(verdict.gate_types["cz"], 2);
    assert_eq!(verdict.gate_types["z"], 2);
    assert_eq!(verdict.gate_types["measure"], 1);
}

#[test]
fn test_grover_three_qubits() {
    let verdict = validate(GROVER_3_QUBIT);
    assert!(verdict.valid, "{:?}", verdict.errors);
    assert_eq!(verdict.qubits, 3);
    assert_eq!(verdict.gate_types["h"], 13);
    assert_eq!(verdict.gate_types["x"], 8);
    assert_eq!(verdict.gate_types["ccx"], 2);
    assert_eq!(verdict.gate_types["measure"], 1);
    assert_eq!(verdict.gates, 24);
    assert_eq!(verdict.depth, 12);
}

#[test]
fn test_grover_four_qubits_with_loop() {
    let verdict = validate(GROVER_4_QUBIT);
    assert!(verdict.valid, "{:?}", verdict.errors);
    assert_eq!(verdict.qubits, 4);
    assert_eq!(verdict.gate_types["h"], 24);
    assert_eq!(verdict.gate_types["x"], 17);
    assert_eq!(verdict.gate_types["ccx"], 6);
    assert_eq!(verdict.gate_types["measure"], 1);
    assert_eq!(verdict.gates, 48);
    assert_eq!(verdict.depth, 22);
}

#[test]
fn test_grover_on_large_backend_has_no_warnings() {
    let request = ValidationRequest::new(GROVER_4_QUBIT).with_backend("ibm_brisbane");
    let report = Validator::new().validate(&request, None);
    assert_eq!(report.outcome, Outcome::Valid);
    assert!(report.verdict.warnings.is_empty());
}
