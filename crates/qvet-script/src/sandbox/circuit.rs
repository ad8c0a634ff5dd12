//! `QuantumCircuit` and gate classes as seen by scripts.
//!
//! Qubit arguments broadcast the way the circuit library does it: an int
//! (negative counts from the end), or a list, tuple or range of ints. A gate
//! call with list operands emits one instruction per broadcast row; a
//! `measure` or `barrier` call always emits a single instruction.

use std::cell::RefCell;
use std::rc::Rc;

use qvet_ir::{
    Circuit, ClbitId, GateSignature, Instruction, QubitId, STANDARD_GATES, StandardGate,
};

use super::value::{CircuitHandle, Dict, GateValue, Value};
use super::{CallArgs, Interpreter};
use crate::capabilities::Class;
use crate::error::{ScriptError, ScriptResult};

/// Circuit methods that are not gates.
const CIRCUIT_METHODS: &[&str] = &[
    "measure",
    "measure_all",
    "barrier",
    "reset",
    "append",
    "depth",
    "size",
    "width",
    "count_ops",
    "copy",
];

const GATE_ALIASES: &[(&str, &str)] = &[
    ("i", "id"),
    ("cnot", "cx"),
    ("toffoli", "ccx"),
    ("fredkin", "cswap"),
];

/// Resolve a circuit method name to its static spelling.
pub(super) fn method_name(name: &str) -> Option<&'static str> {
    STANDARD_GATES
        .iter()
        .map(|sig| sig.name)
        .chain(GATE_ALIASES.iter().map(|(alias, _)| *alias))
        .chain(CIRCUIT_METHODS.iter().copied())
        .find(|m| *m == name)
}

fn gate_signature(name: &str) -> Option<&'static GateSignature> {
    let canonical = GATE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, target)| target);
    GateSignature::by_name(canonical)
}

fn param_names(sig: &GateSignature) -> &'static [&'static str] {
    match sig.num_params {
        0 => &[],
        1 => &["theta"],
        _ => &["theta", "phi", "lam"],
    }
}

fn qubit_names(sig: &GateSignature) -> &'static [&'static str] {
    match (sig.num_qubits, sig.name) {
        (1, _) => &["qubit"],
        (2, "swap" | "iswap" | "rxx" | "ryy" | "rzz") => &["qubit1", "qubit2"],
        (2, _) => &["control_qubit", "target_qubit"],
        (3, "cswap") => &["control_qubit", "target_qubit1", "target_qubit2"],
        _ => &["control_qubit1", "control_qubit2", "target_qubit"],
    }
}

/// Bind positional then keyword arguments to named slots.
fn bind_slots(
    function: &str,
    slots: &[&str],
    mut args: CallArgs,
) -> ScriptResult<Vec<Value>> {
    if args.positional.len() > slots.len() {
        return Err(ScriptError::type_error(format!(
            "{function}() takes {} positional argument{} but {} were given",
            slots.len(),
            if slots.len() == 1 { "" } else { "s" },
            args.positional.len()
        )));
    }
    let mut positional = std::mem::take(&mut args.positional).into_iter();
    let mut values = Vec::with_capacity(slots.len());
    for slot in slots {
        let value = match (positional.next(), args.take_keyword(slot)) {
            (Some(_), Some(_)) => {
                return Err(ScriptError::type_error(format!(
                    "{function}() got multiple values for argument '{slot}'"
                )));
            }
            (Some(v), None) | (None, Some(v)) => v,
            (None, None) => {
                return Err(ScriptError::type_error(format!(
                    "{function}() missing required argument: '{slot}'"
                )));
            }
        };
        values.push(value);
    }
    args.take_keyword("label");
    args.no_more_keywords(function)?;
    Ok(values)
}

fn gate_params(sig: &GateSignature, values: &[Value]) -> ScriptResult<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                ScriptError::circuit_error(format!(
                    "Invalid param type {} for gate {}.",
                    v.type_name(),
                    sig.name
                ))
            })
        })
        .collect()
}

/// Call a circuit or gate class.
pub(super) fn instantiate(
    interp: &mut Interpreter<'_>,
    class: Class,
    mut args: CallArgs,
) -> ScriptResult<Value> {
    match class {
        Class::QuantumCircuit => {
            let name = match args.take_keyword("name") {
                None | Some(Value::None) => None,
                Some(Value::Str(s)) => Some(s.to_string()),
                Some(other) => {
                    return Err(ScriptError::circuit_error(format!(
                        "The circuit name should be a string (or None to auto-generate a name), not '{}'",
                        other.type_name()
                    )));
                }
            };
            args.take_keyword("global_phase");
            args.no_more_keywords("QuantumCircuit")?;
            if args.positional.len() > 2 {
                return Err(ScriptError::circuit_error(
                    "QuantumCircuit() takes at most a qubit count and a classical bit count",
                ));
            }
            let mut sizes = [0u32; 2];
            for (slot, value) in sizes.iter_mut().zip(&args.positional) {
                *slot = register_size(interp, value)?;
            }
            let name = name.unwrap_or_else(|| format!("circuit-{}", interp.circuits_created));
            interp.circuits_created += 1;
            let circuit = Circuit::with_size(name, sizes[0], sizes[1]);
            Ok(Value::Circuit(Rc::new(RefCell::new(circuit))))
        }
        Class::Gate(sig) => {
            let values = bind_slots(sig.class_name, param_names(sig), args)?;
            let params = gate_params(sig, &values)?;
            Ok(Value::Gate(Rc::new(GateValue {
                signature: sig,
                params,
            })))
        }
    }
}

fn register_size(interp: &Interpreter<'_>, value: &Value) -> ScriptResult<u32> {
    let Value::Int(n) = value else {
        return Err(ScriptError::circuit_error(
            "Circuit args must be Registers or integers.",
        ));
    };
    if *n < 0 {
        return Err(ScriptError::circuit_error(format!(
            "Register size must be non-negative ({n} was provided)"
        )));
    }
    let max = interp.limits.max_qubits;
    match u32::try_from(*n) {
        Ok(size) if size <= max => Ok(size),
        _ => Err(ScriptError::memory_error(format!(
            "register of {n} bits exceeds the limit of {max}"
        ))),
    }
}

/// Normalise one bit index against a register of `size` bits.
fn bit_index(value: &Value, size: usize) -> ScriptResult<u32> {
    let Some(raw) = value.as_int() else {
        return Err(ScriptError::circuit_error(format!(
            "Invalid bit index: {} of type '{}'",
            value.repr(),
            value.type_name()
        )));
    };
    let size_i = i64::try_from(size).unwrap_or(i64::MAX);
    let index = if raw < 0 { raw + size_i } else { raw };
    if !(0..size_i).contains(&index) {
        return Err(ScriptError::circuit_error(format!(
            "Index {raw} out of range for size {size}."
        )));
    }
    u32::try_from(index).map_err(|_| ScriptError::overflow())
}

/// Expand a bit specifier into indices.
fn bit_list(interp: &Interpreter<'_>, value: &Value, size: usize) -> ScriptResult<Vec<u32>> {
    match value {
        Value::List(_) | Value::Tuple(_) | Value::Range(_) => interp
            .collect_values(value)?
            .iter()
            .map(|item| bit_index(item, size))
            .collect(),
        single => Ok(vec![bit_index(single, size)?]),
    }
}

/// Combine per-operand index lists into rows of qubits, one row per
/// instruction.
fn broadcast(operands: &[Vec<u32>]) -> ScriptResult<Vec<Vec<QubitId>>> {
    let rows = operands.iter().map(Vec::len).max().unwrap_or(0);
    if operands.iter().any(Vec::is_empty) {
        return Ok(Vec::new());
    }
    if operands.iter().any(|o| o.len() != 1 && o.len() != rows) {
        return Err(ScriptError::circuit_error(format!(
            "Not sure how to combine these qubit arguments (lengths {:?}).",
            operands.iter().map(Vec::len).collect::<Vec<_>>()
        )));
    }
    Ok((0..rows)
        .map(|i| {
            operands
                .iter()
                .map(|o| QubitId(if o.len() == 1 { o[0] } else { o[i] }))
                .collect()
        })
        .collect())
}

/// Append one instruction, charging a step and enforcing the size limit.
fn emit(
    interp: &mut Interpreter<'_>,
    circuit: &mut Circuit,
    instruction: Instruction,
) -> ScriptResult<()> {
    interp.tick()?;
    let max = interp.limits.max_operations;
    if circuit.size() >= max {
        return Err(ScriptError::memory_error(format!(
            "circuit '{}' exceeds the limit of {max} operations",
            circuit.name()
        )));
    }
    circuit.apply(instruction)?;
    Ok(())
}

fn usize_value(n: usize) -> ScriptResult<Value> {
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| ScriptError::overflow())
}

/// Call a method on a circuit.
pub(super) fn call_method(
    interp: &mut Interpreter<'_>,
    handle: &CircuitHandle,
    name: &str,
    mut args: CallArgs,
) -> ScriptResult<Value> {
    if let Some(sig) = gate_signature(name) {
        return apply_gate(interp, handle, name, sig, args);
    }

    match name {
        "depth" | "size" | "width" | "count_ops" | "measure_all" => {
            args.no_more_keywords(name)?;
            args.arity(name, 0, 0)?;
        }
        _ => {}
    }

    match name {
        "depth" => usize_value(handle.borrow().depth()),
        "size" => usize_value(handle.borrow().size()),
        "width" => usize_value(handle.borrow().width()),
        "count_ops" => {
            let mut counts: Vec<_> = handle.borrow().count_ops().into_iter().collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1));
            let mut dict = Dict::new();
            for (op, n) in counts {
                dict.insert(Value::from(op), usize_value(n)?)?;
            }
            Ok(Value::dict(dict))
        }
        "copy" => {
            let rename = args.take_keyword("name").or_else(|| args.positional.pop());
            args.no_more_keywords(name)?;
            args.arity(name, 0, 0)?;
            let mut copy = handle.borrow().clone();
            match rename {
                None | Some(Value::None) => {}
                Some(Value::Str(s)) => copy.set_name(&*s),
                Some(other) => {
                    return Err(ScriptError::type_error(format!(
                        "copy() name must be a string, not '{}'",
                        other.type_name()
                    )));
                }
            }
            interp.circuits_created += 1;
            Ok(Value::Circuit(Rc::new(RefCell::new(copy))))
        }
        "measure_all" => {
            let mut circuit = handle.borrow_mut();
            let qubits: Vec<QubitId> = (0..circuit.num_qubits())
                .filter_map(|q| u32::try_from(q).ok().map(QubitId))
                .collect();
            let count = u32::try_from(qubits.len()).map_err(|_| ScriptError::overflow())?;
            if circuit.num_clbits() + qubits.len() > interp.limits.max_qubits as usize {
                return Err(ScriptError::memory_error(format!(
                    "register of {} bits exceeds the limit of {}",
                    circuit.num_clbits() + qubits.len(),
                    interp.limits.max_qubits
                )));
            }
            let clbits = circuit.add_clbits(count);
            emit(interp, &mut circuit, Instruction::barrier(qubits.iter().copied()))?;
            emit(interp, &mut circuit, Instruction::measure_all(qubits, clbits)?)?;
            Ok(Value::None)
        }
        "barrier" => {
            args.take_keyword("label");
            args.no_more_keywords(name)?;
            let mut circuit = handle.borrow_mut();
            let size = circuit.num_qubits();
            let mut qubits = Vec::new();
            for value in &args.positional {
                qubits.extend(bit_list(interp, value, size)?);
            }
            if args.positional.is_empty() {
                qubits.extend((0..size).filter_map(|q| u32::try_from(q).ok()));
            }
            qubits.dedup();
            emit(
                interp,
                &mut circuit,
                Instruction::barrier(qubits.into_iter().map(QubitId)),
            )?;
            Ok(Value::None)
        }
        "reset" => {
            let [target] = take_slots(name, &["qubit"], args)?;
            let mut circuit = handle.borrow_mut();
            let size = circuit.num_qubits();
            for q in bit_list(interp, &target, size)? {
                emit(interp, &mut circuit, Instruction::reset(QubitId(q)))?;
            }
            Ok(Value::None)
        }
        "measure" => {
            let [qubit, cbit] = take_slots(name, &["qubit", "cbit"], args)?;
            let mut circuit = handle.borrow_mut();
            let qubits = bit_list(interp, &qubit, circuit.num_qubits())?;
            let clbits = bit_list(interp, &cbit, circuit.num_clbits())?;
            if qubits.len() != clbits.len() {
                return Err(ScriptError::circuit_error(format!(
                    "register size error: measuring {} qubits into {} classical bits",
                    qubits.len(),
                    clbits.len()
                )));
            }
            if qubits.is_empty() {
                return Ok(Value::None);
            }
            let instruction = Instruction::measure_all(
                qubits.into_iter().map(QubitId),
                clbits.into_iter().map(ClbitId),
            )?;
            emit(interp, &mut circuit, instruction)?;
            Ok(Value::None)
        }
        "append" => {
            let cargs = args.take_keyword("cargs");
            let qargs = args.take_keyword("qargs");
            let instruction = args.take_keyword("instruction");
            args.no_more_keywords(name)?;
            args.arity(name, 0, 3)?;
            let mut positional = std::mem::take(&mut args.positional).into_iter();
            let instruction = positional.next().or(instruction).ok_or_else(|| {
                ScriptError::type_error("append() missing required argument: 'instruction'")
            })?;
            let qargs = positional.next().or(qargs).unwrap_or(Value::None);
            let cargs = positional.next().or(cargs).unwrap_or(Value::None);
            append(interp, handle, &instruction, &qargs, &cargs)
        }
        other => Err(ScriptError::attribute_error(format!(
            "'QuantumCircuit' object has no attribute '{other}'"
        ))),
    }
}

fn take_slots<const N: usize>(
    function: &str,
    slots: &[&str; N],
    args: CallArgs,
) -> ScriptResult<[Value; N]> {
    let values = bind_slots(function, slots, args)?;
    values
        .try_into()
        .map_err(|_| ScriptError::internal(format!("{function}() slot count mismatch")))
}

fn apply_gate(
    interp: &mut Interpreter<'_>,
    handle: &CircuitHandle,
    method: &str,
    sig: &'static GateSignature,
    args: CallArgs,
) -> ScriptResult<Value> {
    let params = param_names(sig);
    let slots: Vec<&str> = params.iter().chain(qubit_names(sig)).copied().collect();
    let values = bind_slots(method, &slots, args)?;
    let (param_values, qubit_values) = values.split_at(params.len());
    let params = gate_params(sig, param_values)?;
    let gate = StandardGate::from_params(sig.name, &params)?;

    let mut circuit = handle.borrow_mut();
    let size = circuit.num_qubits();
    let operands = qubit_values
        .iter()
        .map(|v| bit_list(interp, v, size))
        .collect::<ScriptResult<Vec<_>>>()?;
    for row in broadcast(&operands)? {
        emit(interp, &mut circuit, Instruction::gate(gate.clone(), row))?;
    }
    Ok(Value::None)
}

fn append(
    interp: &mut Interpreter<'_>,
    handle: &CircuitHandle,
    instruction: &Value,
    qargs: &Value,
    cargs: &Value,
) -> ScriptResult<Value> {
    let Value::Gate(gate) = instruction else {
        return Err(ScriptError::circuit_error(format!(
            "Object to append must be an Operation or have a to_instruction() method, not '{}'",
            instruction.type_name()
        )));
    };
    if !matches!(cargs, Value::None) && !interp.collect_values(cargs)?.is_empty() {
        return Err(ScriptError::circuit_error(format!(
            "The amount of clbit arguments does not match the gate expectation: gate '{}' takes no classical bits",
            gate.signature.name
        )));
    }
    let qargs = match qargs {
        Value::None => Vec::new(),
        other => interp.collect_values(other)?,
    };
    let expected = gate.signature.num_qubits as usize;
    if qargs.len() != expected {
        return Err(ScriptError::circuit_error(format!(
            "The amount of qubit({}) arguments does not match the gate expectation ({expected}).",
            qargs.len()
        )));
    }

    let op = StandardGate::from_params(gate.signature.name, &gate.params)?;
    let mut circuit = handle.borrow_mut();
    let size = circuit.num_qubits();
    let operands = qargs
        .iter()
        .map(|v| bit_list(interp, v, size))
        .collect::<ScriptResult<Vec<_>>>()?;
    for row in broadcast(&operands)? {
        emit(interp, &mut circuit, Instruction::gate(op.clone(), row))?;
    }
    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{run, run_err};
    use crate::error::ErrorKind;
    use qvet_ir::InstructionKind;

    fn circuit(source: &str) -> qvet_ir::Circuit {
        let exec = run(source).unwrap();
        let value = exec.bindings().get("qc").cloned().unwrap();
        let circuit = value.as_circuit().unwrap().borrow().clone();
        circuit
    }

    #[test]
    fn test_bell_circuit() {
        let qc = circuit(
            "from qiskit import QuantumCircuit\nqc = QuantumCircuit(2, 2)\nqc.h(0)\nqc.cx(0, 1)\nqc.measure([0, 1], [0, 1])\n",
        );
        assert_eq!(qc.num_qubits(), 2);
        assert_eq!(qc.size(), 3);
        assert_eq!(qc.depth(), 3);
        let ops = qc.count_ops();
        assert_eq!(ops.get("measure"), Some(&1));
        assert_eq!(qc.instructions()[2].qubits.len(), 2);
    }

    #[test]
    fn test_out_of_range_qubit() {
        let err = run_err("qc = QuantumCircuit(2)\nqc.h(5)\n");
        assert_eq!(err.kind, ErrorKind::CircuitError);
        assert_eq!(err.message, "Index 5 out of range for size 2.");
        assert_eq!(err.line, Some(2));
        let err = run_err("qc = QuantumCircuit(2)\nqc.x(-3)\n");
        assert_eq!(err.message, "Index -3 out of range for size 2.");
    }

    #[test]
    fn test_negative_index_counts_from_end() {
        let qc = circuit("qc = QuantumCircuit(3)\nqc.x(-1)\n");
        assert_eq!(qc.instructions()[0].qubits, vec![qvet_ir::QubitId(2)]);
    }

    #[test]
    fn test_broadcasting() {
        let qc = circuit("qc = QuantumCircuit(4)\nqc.h(range(4))\nqc.cx(0, [1, 2, 3])\nqc.cz([0, 1], [2, 3])\n");
        assert_eq!(qc.count_ops().get("h"), Some(&4));
        assert_eq!(qc.count_ops().get("cx"), Some(&3));
        assert_eq!(qc.count_ops().get("cz"), Some(&2));
        let err = run_err("qc = QuantumCircuit(4)\nqc.cx([0, 1], [1, 2, 3])\n");
        assert_eq!(err.kind, ErrorKind::CircuitError);
    }

    #[test]
    fn test_duplicate_qubits_rejected() {
        let err = run_err("qc = QuantumCircuit(2)\nqc.cx(1, 1)\n");
        assert_eq!(err.kind, ErrorKind::CircuitError);
    }

    #[test]
    fn test_parameterised_gates_and_keywords() {
        let qc = circuit(
            "import math\nqc = QuantumCircuit(2)\nqc.rz(math.pi / 2, 0)\nqc.u(0.1, 0.2, 0.3, qubit=1)\nqc.crx(theta=0.5, control_qubit=0, target_qubit=1)\nqc.cnot(1, 0)\nqc.i(0)\n",
        );
        assert_eq!(qc.size(), 5);
        let ops = qc.count_ops();
        assert_eq!(ops.get("cx"), Some(&1));
        assert_eq!(ops.get("id"), Some(&1));
        let err = run_err("qc = QuantumCircuit(1)\nqc.rx('a', 0)\n");
        assert_eq!(err.kind, ErrorKind::CircuitError);
        let err = run_err("qc = QuantumCircuit(1)\nqc.rx(0.5)\n");
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_measure_all_adds_bits() {
        let qc = circuit("qc = QuantumCircuit(3)\nqc.h(0)\nqc.measure_all()\n");
        assert_eq!(qc.num_clbits(), 3);
        assert!(matches!(qc.instructions()[1].kind, InstructionKind::Barrier));
        assert_eq!(qc.size(), 3);
    }

    #[test]
    fn test_barrier_reset_and_append() {
        let qc = circuit(
            "qc = QuantumCircuit(2)\nqc.barrier()\nqc.reset([0, 1])\nqc.append(CXGate(), [0, 1])\nqc.append(RZGate(0.25), [1])\n",
        );
        assert_eq!(qc.size(), 5);
        assert_eq!(qc.instructions()[0].qubits.len(), 2);
        let err = run_err("qc = QuantumCircuit(2)\nqc.append(CXGate(), [0])\n");
        assert_eq!(err.kind, ErrorKind::CircuitError);
    }

    #[test]
    fn test_accessors_and_name() {
        let exec = run(
            "qc = QuantumCircuit(2, 1, name='bell')\nqc.h(0)\nqc.cx(0, 1)\nd = qc.depth()\nw = qc.width()\nops = qc.count_ops()\nn = qc.num_qubits\nqc.name = 'renamed'\nlabel = qc.name\n",
        )
        .unwrap();
        let get = |name: &str| exec.bindings().get(name).unwrap().repr();
        assert_eq!(get("d"), "2");
        assert_eq!(get("w"), "3");
        assert_eq!(get("ops"), "{'cx': 1, 'h': 1}");
        assert_eq!(get("n"), "2");
        assert_eq!(get("label"), "'renamed'");
    }

    #[test]
    fn test_default_names_are_sequential() {
        let exec = run("a = QuantumCircuit(1)\nb = QuantumCircuit(1)\n").unwrap();
        let name = |n: &str| {
            exec.bindings()
                .get(n)
                .and_then(|v| v.as_circuit().map(|c| c.borrow().name().to_string()))
                .unwrap()
        };
        assert_eq!(name("a"), "circuit-0");
        assert_eq!(name("b"), "circuit-1");
    }

    #[test]
    fn test_circuit_limits() {
        let err = run_err("qc = QuantumCircuit(10 ** 9)\n");
        assert_eq!(err.kind, ErrorKind::MemoryError);
        let err = run_err("qc = QuantumCircuit(-1)\n");
        assert_eq!(err.kind, ErrorKind::CircuitError);
        let err = run_err("qc = QuantumCircuit('two')\n");
        assert_eq!(err.kind, ErrorKind::CircuitError);
    }
}
