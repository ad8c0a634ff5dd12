//! Property-based tests for the script front end and sandbox.
//!
//! Submitted code is untrusted, so the lexer, parser and interpreter must
//! return an error for anything they cannot handle, never panic.

use std::sync::Arc;

use proptest::prelude::*;
use qvet_script::{Capabilities, ExecutionLimits, Sandbox, Value, parse};

fn small_sandbox() -> Sandbox {
    let limits = ExecutionLimits {
        max_steps: 20_000,
        max_collection_len: 10_000,
        ..ExecutionLimits::default()
    };
    Sandbox::new(Arc::new(Capabilities::standard()), limits)
}

/// Fragments that, glued together, hit most of the grammar.
fn arb_fragment() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "qc", "=", "QuantumCircuit", "(", ")", "[", "]", "{", "}", ",", ":", ".", "h", "cx",
        "measure", "0", "1", "-1", "2.5", "'s'", "f'{x}'", "for", "in", "range", "if", "else",
        "while", "def", "return", "+", "*", "**", "//", "not", "and", "\n", "    ", "#c\n",
        "import", "from", "qiskit", "math", "x", "lambda", "class", ";", "\\\n",
    ])
}

proptest! {
    /// Arbitrary text never panics the parser.
    #[test]
    fn test_parse_never_panics_on_arbitrary_text(source in "\\PC{0,200}") {
        let _ = parse(&source);
    }

    /// Token soup never panics the parser, and anything that parses runs to
    /// a result without panicking.
    #[test]
    fn test_token_soup_never_panics(fragments in prop::collection::vec(arb_fragment(), 0..40)) {
        let source = fragments.join(" ");
        if let Ok(program) = parse(&source) {
            let _ = small_sandbox().execute(&program, None);
        }
    }

    /// Integer arithmetic follows floor-division semantics.
    #[test]
    fn test_floor_division_identity(a in -10_000i64..10_000, b in -100i64..100) {
        prop_assume!(b != 0);
        let program = parse(&format!("q = {a} // {b}\nr = {a} % {b}\nok = q * {b} + r == {a}\n")).unwrap();
        let execution = small_sandbox().execute(&program, None).unwrap();
        let ok = execution.bindings().get("ok").cloned();
        prop_assert!(matches!(ok, Some(Value::Bool(true))));
    }

    /// Broadcasting a gate over a range emits one instruction per qubit.
    #[test]
    fn test_broadcast_size_matches_range(n in 1u32..40) {
        let program = parse(&format!("qc = QuantumCircuit({n})\nqc.h(range({n}))\n")).unwrap();
        let execution = small_sandbox().execute(&program, None).unwrap();
        let qc = execution.bindings().get("qc").and_then(Value::as_circuit).cloned().unwrap();
        prop_assert_eq!(qc.borrow().size(), n as usize);
        prop_assert_eq!(qc.borrow().depth(), 1);
    }
}
