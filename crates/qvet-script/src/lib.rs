//! Circuit Script Language for qvet
//!
//! This crate parses and runs the small Python-like language in which
//! circuits are submitted (Qiskit-style scripts), inside a sandbox whose
//! reachable names are an explicit allow-list.
//!
//! # Supported Features
//!
//! | Feature | Status | Example |
//! |---------|--------|---------|
//! | Imports from the allow-list | ✅ | `from qiskit import QuantumCircuit` |
//! | Circuit construction | ✅ | `qc = QuantumCircuit(2, 2)` |
//! | Gates, with broadcasting | ✅ | `qc.h(range(3))`, `qc.cx(0, [1, 2])` |
//! | Parameterized gates | ✅ | `qc.rz(math.pi / 4, 0)` |
//! | Functions and loops | ✅ | `def oracle(qc): ...`, `for i in range(n):` |
//! | Comprehensions, f-strings | ✅ | `[i for i in range(4)]`, `f"q{i}"` |
//! | `class`, `try`, `with`, `lambda` | ❌ | rejected by the parser |
//! | File, network or process access | ❌ | names are not defined |
//!
//! # Example: Running a Script
//!
//! ```rust
//! use qvet_script::{Sandbox, parse};
//!
//! let source = r#"
//! from qiskit import QuantumCircuit
//! qc = QuantumCircuit(2, 2)
//! qc.h(0)
//! qc.cx(0, 1)
//! qc.measure([0, 1], [0, 1])
//! "#;
//!
//! let program = parse(source).unwrap();
//! let execution = Sandbox::default().execute(&program, None).unwrap();
//! let qc = execution.bindings().get("qc").unwrap().as_circuit().unwrap();
//! assert_eq!(qc.borrow().num_qubits(), 2);
//! assert_eq!(qc.borrow().size(), 3);
//! ```
//!
//! # Example: Failures
//!
//! ```rust
//! use qvet_script::{ErrorKind, Sandbox, parse};
//!
//! // Syntax errors carry a line number.
//! let err = parse("qc = QuantumCircuit(2\nqc.h(0").unwrap_err();
//! assert_eq!(err.line, 1);
//!
//! // Runtime errors carry a kind and a message.
//! let program = parse("import os\n").unwrap();
//! let err = Sandbox::default().execute(&program, None).unwrap_err();
//! assert_eq!(err.kind, ErrorKind::ImportError);
//! ```

mod ast;
mod capabilities;
mod error;
mod lexer;
mod parser;
mod sandbox;

pub use capabilities::{Builtin, Capabilities, Class, Global, MathFn, Module};
pub use error::{ErrorKind, ParseResult, ScriptError, ScriptResult, SyntaxError};
pub use parser::{DEFAULT_MAX_NESTING, parse, parse_with_nesting_limit};
pub use sandbox::{
    CircuitHandle, DEADLINE_EXCEEDED, Dict, Execution, ExecutionLimits, GateValue, RangeValue,
    Sandbox, Scope, Value,
};

// Re-export AST types for advanced users
pub mod syntax {
    pub use crate::ast::*;
    pub use crate::lexer::{SpannedToken, Token, tokenize};
}
