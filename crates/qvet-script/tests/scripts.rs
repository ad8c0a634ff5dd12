//! End-to-end script tests: parse, execute, inspect the circuit.

use qvet_script::{ErrorKind, Execution, Sandbox, parse};

fn execute(source: &str) -> Execution {
    let program = parse(source).expect("script parses");
    Sandbox::default()
        .execute(&program, None)
        .expect("script runs")
}

fn circuit_of(execution: &Execution, name: &str) -> qvet_ir::Circuit {
    let handle = execution
        .bindings()
        .get(name)
        .and_then(|v| v.as_circuit())
        .expect("binding is a circuit");
    handle.borrow().clone()
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

#[test]
fn test_grover_two_qubits() {
    let execution = execute(GROVER_2_QUBIT);
    let qc = circuit_of(&execution, "qc");
    let ops = qc.count_ops();
    assert_eq!(ops.get("h"), Some(&6));
    assert_eq!(ops.get("cz"), Some(&2));
    assert_eq!(ops.get("z"), Some(&2));
    assert_eq!(ops.get("measure"), Some(&1));
    assert_eq!(qc.size(), 11);
    assert_eq!(qc.depth(), 7);
}

#[test]
fn test_helper_functions_build_circuits() {
    let source = r#"
from qiskit import QuantumCircuit
from qiskit.circuit.library import HGate, CXGate

def ghz(n, name="ghz"):
    circuit = QuantumCircuit(n, name=name)
    circuit.append(HGate(), [0])
    for i in range(n - 1):
        circuit.append(CXGate(), [i, i + 1])
    return circuit

qc = ghz(5)
qc.measure_all()
summary = f"{qc.name}: {qc.num_qubits} qubits, depth {qc.depth()}"
print(summary)
"#;
    let execution = execute(source);
    let qc = circuit_of(&execution, "qc");
    assert_eq!(qc.name(), "ghz");
    assert_eq!(qc.num_clbits(), 5);
    assert_eq!(execution.stdout(), "ghz: 5 qubits, depth 6\n");
    assert!(execution.bindings().get("circuit").is_none());
}

#[test]
fn test_qft_style_script() {
    let source = r#"
import math
from qiskit import QuantumCircuit

n = 4
qc = QuantumCircuit(n)
for target in range(n):
    qc.h(target)
    for k, control in enumerate(range(target + 1, n), start=2):
        qc.cp(2 * math.pi / 2 ** k, control, target)
for i in range(n // 2):
    qc.swap(i, n - i - 1)
"#;
    let qc = circuit_of(&execute(source), "qc");
    let ops = qc.count_ops();
    assert_eq!(ops.get("h"), Some(&4));
    assert_eq!(ops.get("cp"), Some(&6));
    assert_eq!(ops.get("swap"), Some(&2));
}

#[test]
fn test_escape_attempts_fail_closed() {
    let attempts = [
        ("import os\nos.system('ls')\n", ErrorKind::ImportError),
        ("import subprocess\n", ErrorKind::ImportError),
        ("from qiskit import QuantumCircuit\nQuantumCircuit.__init__\n", ErrorKind::AttributeError),
        ("open('/etc/passwd').read()\n", ErrorKind::NameError),
        ("__builtins__['eval']('1')\n", ErrorKind::NameError),
        ("(1).__class__.__bases__\n", ErrorKind::AttributeError),
        ("import math\nmath.__loader__\n", ErrorKind::AttributeError),
    ];
    for (source, kind) in attempts {
        let program = parse(source).expect("script parses");
        let err = Sandbox::default()
            .execute(&program, None)
            .err()
            .unwrap_or_else(|| panic!("{source:?} must fail"));
        assert_eq!(err.kind, kind, "{source:?}");
    }
}

#[test]
fn test_refused_syntax() {
    for source in [
        "class A:\n    pass\n",
        "try:\n    x = 1\nexcept Exception:\n    pass\n",
        "with open('f') as f:\n    pass\n",
        "f = lambda x: x\n",
        "del x\n",
        "raise ValueError()\n",
        "@decorator\ndef f():\n    pass\n",
    ] {
        assert!(parse(source).is_err(), "{source:?} must be refused");
    }
}
