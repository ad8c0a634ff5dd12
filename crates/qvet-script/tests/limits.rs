//! Hostile scripts must end in a Python error, never a crash.
//!
//! Each case runs on a thread with the 2 MiB stack tokio gives its blocking
//! pool, which is where the validator executes scripts.

use std::sync::Arc;
use std::thread;

use qvet_script::{
    Capabilities, ErrorKind, ExecutionLimits, Sandbox, ScriptError, SyntaxError, parse,
};

const WORKER_STACK: usize = 2 * 1024 * 1024;

type Outcome = Result<Result<(), ScriptError>, SyntaxError>;

fn run_on_worker(source: String, limits: ExecutionLimits) -> Outcome {
    thread::Builder::new()
        .stack_size(WORKER_STACK)
        .spawn(move || -> Outcome {
            let program = parse(&source)?;
            let sandbox = Sandbox::new(Arc::new(Capabilities::standard()), limits);
            Ok(sandbox.execute(&program, None).map(drop))
        })
        .expect("spawn worker")
        .join()
        .expect("worker thread finished")
}

fn syntax_error(source: String) -> SyntaxError {
    match run_on_worker(source, ExecutionLimits::default()) {
        Err(err) => err,
        Ok(result) => panic!("expected a syntax error, got {result:?}"),
    }
}

fn runtime_error_with(source: &str, limits: ExecutionLimits) -> ScriptError {
    match run_on_worker(source.to_string(), limits) {
        Ok(Err(err)) => err,
        other => panic!("expected a runtime error for {source:?}, got {other:?}"),
    }
}

fn runtime_error(source: &str) -> ScriptError {
    runtime_error_with(source, ExecutionLimits::default())
}

fn long_running() -> ExecutionLimits {
    ExecutionLimits {
        max_steps: 100_000_000,
        ..ExecutionLimits::default()
    }
}

#[test]
fn test_format_spec_bombs() {
    let err = runtime_error("s = f'{1:>99999999999}'\n");
    assert_eq!(err.kind, ErrorKind::MemoryError);

    let err = runtime_error("s = f'{1.0:.99999999999f}'\n");
    assert_eq!(err.kind, ErrorKind::ValueError);
    assert_eq!(err.message, "Too many decimal digits in format string");

    let err = runtime_error("s = f'{1e300:.900000f}'\n");
    assert_eq!(err.kind, ErrorKind::MemoryError);
}

#[test]
fn test_string_builders_are_sized_up_front() {
    for source in [
        "s = 'a' * 1000000\nt = s.replace('a', s)\n",
        "s = ''.join(['a' * 1000000] * 1000000)\n",
        "s = ('-' * 1000000).join(['a', 'b'])\n",
        "s = 'a' * 1000000\nt = f'{s}{s}'\n",
        "s = 'a' * 1000000\nt = str([s])\n",
    ] {
        let err = runtime_error(source);
        assert_eq!(err.kind, ErrorKind::MemoryError, "{source:?}: {err}");
    }
}

#[test]
fn test_long_operator_chains_are_syntax_errors() {
    for terms in [600, 20_000] {
        let err = syntax_error(format!("x = 1{}\n", " + 1".repeat(terms)));
        assert_eq!(err.message, "expression is too deeply nested");
    }
    for chain in [" or 1", " and 1", " * 2", " ** 2", "[0]", ".real", "()"] {
        let err = syntax_error(format!("x = 1{}\n", chain.repeat(20_000)));
        assert!(!err.message.is_empty(), "{chain}");
    }
}

#[test]
fn test_deep_brackets_are_syntax_errors() {
    for (open, close) in [("(", ")"), ("[", "]"), ("{1: ", "}"), ("-", ""), ("not ", "")] {
        let source = format!("x = {}1{}\n", open.repeat(20_000), close.repeat(20_000));
        syntax_error(source);
    }

    let mut blocks = String::new();
    for depth in 0..500 {
        blocks.push_str(&"    ".repeat(depth));
        blocks.push_str("if True:\n");
    }
    blocks.push_str(&"    ".repeat(500));
    blocks.push_str("pass\n");
    syntax_error(blocks);
}

#[test]
fn test_deeply_nested_list_is_released() {
    let source = "x = []\nfor i in range(1000000):\n    x = [x]\nx = None\n";
    assert!(matches!(run_on_worker(source.to_string(), long_running()), Ok(Ok(()))));

    let source = "x = []\nfor i in range(1000000):\n    x = (x,)\n";
    assert!(matches!(run_on_worker(source.to_string(), long_running()), Ok(Ok(()))));
}

#[test]
fn test_deeply_nested_list_walks_are_recursion_errors() {
    let build = "x = []\ny = []\nfor i in range(1000000):\n    x = [x]\n    y = [y]\n";
    for walk in [
        "print(x)\n",
        "s = str(x)\n",
        "s = f'{x!r}'\n",
        "b = x == y\n",
        "b = x < y\n",
        "b = x in [y]\n",
    ] {
        let err = runtime_error_with(&format!("{build}{walk}"), long_running());
        assert_eq!(err.kind, ErrorKind::RecursionError, "{walk:?}: {err}");
    }

    let source = "t = ()\nfor i in range(1000000):\n    t = (t,)\nd = {t: 1}\n";
    let err = runtime_error_with(source, long_running());
    assert_eq!(err.kind, ErrorKind::RecursionError);
}

#[test]
fn test_total_allocation_budget() {
    let source = "l = []\nfor i in range(900000):\n    l.append([0] * 900000)\n";
    let err = runtime_error(source);
    assert_eq!(err.kind, ErrorKind::MemoryError);
    assert!(err.message.contains("in total"), "{}", err.message);

    let source = "s = ''\nfor i in range(900000):\n    s = s + 'x' * 900000\n";
    assert_eq!(runtime_error(source).kind, ErrorKind::MemoryError);
}

#[test]
fn test_recursion_through_nested_expressions() {
    let nested = format!("{}n{}", "[".repeat(30), "]".repeat(30));
    let source = format!("def f(n):\n    return f({nested})\nf(0)\n");
    let err = runtime_error(&source);
    assert_eq!(err.kind, ErrorKind::RecursionError);

    let source = "def f(n):\n    return [f(n + 1)]\nf(0)\n";
    assert_eq!(runtime_error(source).kind, ErrorKind::RecursionError);
}

#[test]
fn test_wide_integer_literal_is_an_overflow_error() {
    let err = runtime_error("x = 123456789012345678901234567890\n");
    assert_eq!(err.kind, ErrorKind::OverflowError);

    let outcome = run_on_worker(
        "x = -9223372036854775808\n".to_string(),
        ExecutionLimits::default(),
    );
    assert!(matches!(outcome, Ok(Ok(()))));
}
