//! Attribute access, subscripts and the per-type method tables.

use std::rc::Rc;

use super::builtins::{index_int, sort_values};
use super::value::{BoundMethod, Value};
use super::{CallArgs, Interpreter, circuit};
use crate::error::{ErrorKind, ScriptError, ScriptResult};

const LIST_METHODS: &[&str] = &[
    "append", "extend", "pop", "insert", "index", "count", "reverse", "copy", "clear", "sort",
];
const DICT_METHODS: &[&str] = &["keys", "values", "items", "get", "copy"];
const STR_METHODS: &[&str] = &[
    "join",
    "upper",
    "lower",
    "split",
    "strip",
    "replace",
    "startswith",
    "endswith",
];

fn no_attribute(value: &Value, name: &str) -> ScriptError {
    match value {
        Value::Module(m) => ScriptError::attribute_error(format!(
            "module '{}' has no attribute '{name}'",
            m.path()
        )),
        other => ScriptError::attribute_error(format!(
            "'{}' object has no attribute '{name}'",
            other.type_name()
        )),
    }
}

fn bound(value: &Value, table: &[&'static str], name: &str) -> Option<Value> {
    table.iter().find(|m| **m == name).map(|m| {
        Value::Method(Rc::new(BoundMethod {
            receiver: value.clone(),
            name: *m,
        }))
    })
}

/// `value.name`
pub(super) fn get_attribute(value: &Value, name: &str) -> ScriptResult<Value> {
    if name.starts_with('_') {
        return Err(no_attribute(value, name));
    }
    let found = match value {
        Value::Module(m) => m.attribute(name).map(Value::from),
        Value::Circuit(c) => match name {
            "num_qubits" => Some(Value::Int(len_int(c.borrow().num_qubits())?)),
            "num_clbits" => Some(Value::Int(len_int(c.borrow().num_clbits())?)),
            "name" => Some(Value::from(c.borrow().name())),
            _ => circuit::method_name(name).map(|m| {
                Value::Method(Rc::new(BoundMethod {
                    receiver: value.clone(),
                    name: m,
                }))
            }),
        },
        Value::Gate(g) => match name {
            "name" => Some(Value::from(g.signature.name)),
            "num_qubits" => Some(Value::Int(i64::from(g.signature.num_qubits))),
            "params" => Some(Value::list(
                g.params.iter().copied().map(Value::Float).collect(),
            )),
            _ => None,
        },
        Value::Range(r) => match name {
            "start" => Some(Value::Int(r.start)),
            "stop" => Some(Value::Int(r.stop)),
            "step" => Some(Value::Int(r.step)),
            _ => None,
        },
        Value::List(_) => bound(value, LIST_METHODS, name),
        Value::Dict(_) => bound(value, DICT_METHODS, name),
        Value::Str(_) => bound(value, STR_METHODS, name),
        _ => None,
    };
    found.ok_or_else(|| no_attribute(value, name))
}

/// `value.name = new`. Only a circuit's name is writable.
pub(super) fn set_attribute(value: &Value, name: &str, new: Value) -> ScriptResult<()> {
    match (value, name) {
        (Value::Circuit(c), "name") => match new {
            Value::Str(s) => {
                c.borrow_mut().set_name(&*s);
                Ok(())
            }
            other => Err(ScriptError::type_error(format!(
                "circuit name must be a string, not '{}'",
                other.type_name()
            ))),
        },
        _ => Err(read_only_attribute(value, name)),
    }
}

pub(super) fn read_only_attribute(value: &Value, name: &str) -> ScriptError {
    if get_attribute(value, name).is_err() {
        return no_attribute(value, name);
    }
    ScriptError::attribute_error(format!(
        "'{}' object attribute '{name}' is read-only",
        value.type_name()
    ))
}

fn len_int(n: usize) -> ScriptResult<i64> {
    i64::try_from(n).map_err(|_| ScriptError::overflow())
}

/// Resolve a possibly negative index into `0..len`.
fn normalise(index: &Value, len: usize, kind: &str) -> ScriptResult<usize> {
    let raw = index.as_int().ok_or_else(|| {
        ScriptError::type_error(format!(
            "{kind} indices must be integers or slices, not {}",
            index.type_name()
        ))
    })?;
    let len_i = len_int(len)?;
    let i = if raw < 0 { raw + len_i } else { raw };
    if !(0..len_i).contains(&i) {
        return Err(ScriptError::index_error(format!(
            "{kind} index out of range"
        )));
    }
    usize::try_from(i).map_err(|_| ScriptError::overflow())
}

/// `value[index]`
pub(super) fn get_item(value: &Value, index: &Value) -> ScriptResult<Value> {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            Ok(items[normalise(index, items.len(), "list")?].clone())
        }
        Value::Tuple(items) => Ok(items[normalise(index, items.len(), "tuple")?].clone()),
        Value::Str(s) => {
            let len = s.chars().count();
            let i = normalise(index, len, "string")?;
            Ok(s.chars().nth(i).map_or(Value::None, |c| Value::from(c.to_string())))
        }
        Value::Range(r) => {
            let i = normalise(index, r.len(), "range object")?;
            r.get(i).map(Value::Int).ok_or_else(ScriptError::overflow)
        }
        Value::Dict(d) => d.borrow().get(index)?.cloned().ok_or_else(|| {
            ScriptError::new(ErrorKind::KeyError, index.repr())
        }),
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `value[index] = new`
pub(super) fn set_item(value: &Value, index: Value, new: Value) -> ScriptResult<()> {
    match value {
        Value::List(items) => {
            let len = items.borrow().len();
            let i = normalise(&index, len, "list assignment")?;
            items.borrow_mut()[i] = new;
            Ok(())
        }
        Value::Dict(d) => d.borrow_mut().insert(index, new),
        other => Err(ScriptError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// Start, count and step of a slice over a sequence of `len` items.
fn slice_bounds(
    len: usize,
    lower: Option<Value>,
    upper: Option<Value>,
    step: Option<Value>,
) -> ScriptResult<(i64, usize, i64)> {
    let as_bound = |v: Option<Value>| -> ScriptResult<Option<i64>> {
        match v {
            None | Some(Value::None) => Ok(None),
            Some(v) => v.as_int().map(Some).ok_or_else(|| {
                ScriptError::type_error("slice indices must be integers or None")
            }),
        }
    };
    let step = as_bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(ScriptError::value_error("slice step cannot be zero"));
    }
    let len = len_int(len)?;
    let clamp = |bound: i64| -> i64 {
        let bound = if bound < 0 { bound + len } else { bound };
        if step < 0 {
            bound.clamp(-1, len - 1)
        } else {
            bound.clamp(0, len)
        }
    };
    let (default_start, default_stop) = if step < 0 { (len - 1, -1) } else { (0, len) };
    let start = as_bound(lower)?.map_or(default_start, clamp);
    let stop = as_bound(upper)?.map_or(default_stop, clamp);

    let span = if step > 0 { stop - start } else { start - stop };
    let count = if span <= 0 {
        0
    } else {
        (span - 1) / step.abs() + 1
    };
    Ok((start, usize::try_from(count).unwrap_or(0), step))
}

fn slice_indices(start: i64, count: usize, step: i64) -> impl Iterator<Item = usize> {
    (0..count).filter_map(move |k| {
        let k = i64::try_from(k).ok()?;
        usize::try_from(start + k * step).ok()
    })
}

/// `value[lower:upper:step]`
pub(super) fn get_slice(
    value: &Value,
    lower: Option<Value>,
    upper: Option<Value>,
    step: Option<Value>,
) -> ScriptResult<Value> {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            let (start, count, step) = slice_bounds(items.len(), lower, upper, step)?;
            Ok(Value::list(
                slice_indices(start, count, step)
                    .map(|i| items[i].clone())
                    .collect(),
            ))
        }
        Value::Tuple(items) => {
            let (start, count, step) = slice_bounds(items.len(), lower, upper, step)?;
            Ok(Value::tuple(
                slice_indices(start, count, step)
                    .map(|i| items[i].clone())
                    .collect(),
            ))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (start, count, step) = slice_bounds(chars.len(), lower, upper, step)?;
            Ok(Value::from(
                slice_indices(start, count, step)
                    .map(|i| chars[i])
                    .collect::<String>(),
            ))
        }
        Value::Range(r) => {
            let (start, count, step) = slice_bounds(r.len(), lower, upper, step)?;
            let first = if count == 0 {
                r.start
            } else {
                usize::try_from(start)
                    .ok()
                    .and_then(|i| r.get(i))
                    .ok_or_else(ScriptError::overflow)?
            };
            let new_step = r.step.checked_mul(step).ok_or_else(ScriptError::overflow)?;
            let stop = len_int(count)?
                .checked_mul(new_step)
                .and_then(|span| first.checked_add(span))
                .ok_or_else(ScriptError::overflow)?;
            Ok(Value::Range(super::RangeValue {
                start: first,
                stop,
                step: new_step,
            }))
        }
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Call a bound method.
pub(super) fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    args: CallArgs,
) -> ScriptResult<Value> {
    match receiver {
        Value::Circuit(c) => circuit::call_method(interp, c, name, args),
        Value::List(_) => list_method(interp, receiver, name, args),
        Value::Dict(_) => dict_method(receiver, name, args),
        Value::Str(s) => str_method(interp, s, name, args),
        other => Err(no_attribute(other, name)),
    }
}

fn list_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    mut args: CallArgs,
) -> ScriptResult<Value> {
    let Value::List(list) = receiver else {
        return Err(no_attribute(receiver, name));
    };
    let reverse = if name == "sort" {
        args.take_keyword("reverse").is_some_and(|v| v.truthy())
    } else {
        false
    };
    args.no_more_keywords(name)?;
    let (min, max) = match name {
        "append" | "extend" | "index" | "count" => (1, 1),
        "pop" => (0, 1),
        "insert" => (2, 2),
        _ => (0, 0),
    };
    args.arity(name, min, max)?;
    let mut a = std::mem::take(&mut args.positional).into_iter();

    match name {
        "append" => {
            interp.check_len(list.borrow().len() + 1)?;
            interp.charge(1)?;
            list.borrow_mut().extend(a);
            Ok(Value::None)
        }
        "extend" => {
            let extra = match a.next() {
                Some(v) => interp.collect_values(&v)?,
                None => Vec::new(),
            };
            interp.check_len(list.borrow().len() + extra.len())?;
            interp.charge(extra.len())?;
            list.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "pop" => {
            let len = list.borrow().len();
            if len == 0 {
                return Err(ScriptError::index_error("pop from empty list"));
            }
            let i = match a.next() {
                Some(index) => normalise(&index, len, "pop")?,
                None => len - 1,
            };
            Ok(list.borrow_mut().remove(i))
        }
        "insert" => {
            let (Some(index), Some(item)) = (a.next(), a.next()) else {
                return Err(ScriptError::internal("insert() arity"));
            };
            let len = list.borrow().len();
            interp.check_len(len + 1)?;
            interp.charge(1)?;
            let len_i = len_int(len)?;
            let raw = index_int(&index)?;
            let at = if raw < 0 { raw + len_i } else { raw }.clamp(0, len_i);
            list.borrow_mut()
                .insert(usize::try_from(at).unwrap_or(len), item);
            Ok(Value::None)
        }
        "index" | "count" => {
            let needle = a.next().unwrap_or(Value::None);
            let items = list.borrow();
            if name == "count" {
                let mut n = 0;
                for item in items.iter() {
                    if item.equals(&needle)? {
                        n += 1;
                    }
                }
                return Ok(Value::Int(len_int(n)?));
            }
            let mut found = None;
            for (i, item) in items.iter().enumerate() {
                if item.equals(&needle)? {
                    found = Some(i);
                    break;
                }
            }
            match found {
                Some(i) => Ok(Value::Int(len_int(i)?)),
                None => Err(ScriptError::value_error(format!(
                    "{} is not in list",
                    needle.repr()
                ))),
            }
        }
        "reverse" => {
            list.borrow_mut().reverse();
            Ok(Value::None)
        }
        "clear" => {
            list.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => Ok(Value::list(list.borrow().to_vec())),
        "sort" => {
            let mut items = std::mem::take(&mut *list.borrow_mut());
            let sorted = sort_values(&mut items, reverse);
            *list.borrow_mut() = items;
            sorted.map(|()| Value::None)
        }
        _ => Err(no_attribute(receiver, name)),
    }
}

fn dict_method(receiver: &Value, name: &str, args: CallArgs) -> ScriptResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(no_attribute(receiver, name));
    };
    args.no_more_keywords(name)?;
    let dict = dict.borrow();
    match name {
        "keys" | "values" | "items" | "copy" => {
            args.arity(name, 0, 0)?;
            Ok(match name {
                "keys" => Value::list(dict.keys().cloned().collect()),
                "values" => Value::list(dict.values().cloned().collect()),
                "items" => Value::list(
                    dict.iter()
                        .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                        .collect(),
                ),
                _ => Value::dict(dict.clone()),
            })
        }
        "get" => {
            args.arity(name, 1, 2)?;
            let default = args.positional.get(1).cloned().unwrap_or(Value::None);
            Ok(dict.get(&args.positional[0])?.cloned().unwrap_or(default))
        }
        _ => Err(no_attribute(receiver, name)),
    }
}

fn str_arg<'v>(value: &'v Value, function: &str) -> ScriptResult<&'v str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(ScriptError::type_error(format!(
            "{function}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

fn join_item(part: &Value) -> ScriptResult<&str> {
    match part {
        Value::Str(s) => Ok(s),
        other => Err(ScriptError::type_error(format!(
            "sequence item: expected str instance, {} found",
            other.type_name()
        ))),
    }
}

fn str_method(
    interp: &mut Interpreter<'_>,
    s: &Rc<str>,
    name: &str,
    args: CallArgs,
) -> ScriptResult<Value> {
    args.no_more_keywords(name)?;
    let a = &args.positional;
    match name {
        "upper" | "lower" | "strip" => {
            args.arity(name, 0, 1)?;
            Ok(Value::from(match (name, a.first()) {
                ("upper", None) => s.to_uppercase(),
                ("lower", None) => s.to_lowercase(),
                ("strip", None | Some(Value::None)) => s.trim().to_string(),
                ("strip", Some(chars)) => {
                    let chars: Vec<char> = str_arg(chars, name)?.chars().collect();
                    s.trim_matches(chars.as_slice()).to_string()
                }
                _ => {
                    return Err(ScriptError::type_error(format!(
                        "{name}() takes no arguments"
                    )));
                }
            }))
        }
        "join" => {
            args.arity(name, 1, 1)?;
            let parts = interp.collect_values(&a[0])?;
            let mut total = s.len().saturating_mul(parts.len().saturating_sub(1));
            for part in &parts {
                total = total.saturating_add(join_item(part)?.len());
            }
            interp.check_len(total)?;
            let mut joined = String::with_capacity(total);
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    joined.push_str(s);
                }
                joined.push_str(join_item(part)?);
            }
            Ok(Value::from(joined))
        }
        "split" => {
            args.arity(name, 0, 1)?;
            let pieces: Vec<Value> = match a.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg(sep, name)?;
                    if sep.is_empty() {
                        return Err(ScriptError::value_error("empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::list(pieces))
        }
        "replace" => {
            args.arity(name, 2, 2)?;
            let from = str_arg(&a[0], name)?;
            let to = str_arg(&a[1], name)?;
            if from.is_empty() {
                return Ok(Value::Str(Rc::clone(s)));
            }
            let hits = s.matches(from).count();
            let len = (s.len() - hits * from.len()).saturating_add(hits.saturating_mul(to.len()));
            interp.check_len(len)?;
            Ok(Value::from(s.replace(from, to)))
        }
        "startswith" | "endswith" => {
            args.arity(name, 1, 1)?;
            let candidates: Vec<Value> = match &a[0] {
                Value::Tuple(t) => t.to_vec(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let affix = str_arg(candidate, name)?;
                let hit = if name == "startswith" {
                    s.starts_with(affix)
                } else {
                    s.ends_with(affix)
                };
                if hit {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        _ => Err(no_attribute(&Value::Str(s.clone()), name)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{run, run_err};
    use crate::error::ErrorKind;

    fn eval(source: &str) -> String {
        let exec = run(source).unwrap();
        exec.bindings().get("result").unwrap().repr()
    }

    #[test]
    fn test_indexing() {
        assert_eq!(eval("a = [1, 2, 3]\nresult = a[-1] + a[0]\n"), "4");
        assert_eq!(eval("result = 'qubit'[1]\n"), "'u'");
        assert_eq!(eval("result = range(0, 20, 5)[2]\n"), "10");
        let err = run_err("a = [1]\na[3]\n");
        assert_eq!(err.kind, ErrorKind::IndexError);
        assert_eq!(err.message, "list index out of range");
        let err = run_err("d = {'a': 1}\nd['b']\n");
        assert_eq!(err.kind, ErrorKind::KeyError);
        assert_eq!(err.message, "'b'");
    }

    #[test]
    fn test_item_assignment() {
        assert_eq!(eval("a = [0, 0]\na[-1] = 5\nresult = a\n"), "[0, 5]");
        assert_eq!(eval("d = {}\nd['x'] = 1\nd['x'] += 2\nresult = d\n"), "{'x': 3}");
        assert_eq!(run_err("t = (1, 2)\nt[0] = 3\n").kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_slices() {
        assert_eq!(eval("result = [0, 1, 2, 3, 4][1:4]\n"), "[1, 2, 3]");
        assert_eq!(eval("result = [0, 1, 2, 3, 4][::-2]\n"), "[4, 2, 0]");
        assert_eq!(eval("result = 'abcdef'[-3:]\n"), "'def'");
        assert_eq!(eval("result = (1, 2, 3)[5:]\n"), "()");
        assert_eq!(eval("result = list(range(10)[2:8:3])\n"), "[2, 5]");
        assert_eq!(run_err("[1][::0]\n").kind, ErrorKind::ValueError);
    }

    #[test]
    fn test_list_methods() {
        assert_eq!(
            eval("a = [3]\na.append(1)\na.extend(range(2))\na.insert(0, 9)\nresult = a\n"),
            "[9, 3, 1, 0, 1]"
        );
        assert_eq!(eval("a = [1, 2, 3]\nx = a.pop()\nresult = (x, a.pop(0), a)\n"), "(3, 1, [2])");
        assert_eq!(eval("a = [2, 1, 2]\nresult = (a.index(1), a.count(2))\n"), "(1, 2)");
        assert_eq!(eval("a = [2, 3, 1]\na.sort(reverse=True)\nresult = a\n"), "[3, 2, 1]");
        assert_eq!(run_err("[].pop()\n").kind, ErrorKind::IndexError);
    }

    #[test]
    fn test_dict_and_str_methods() {
        assert_eq!(
            eval("d = {'h': 2, 'cx': 1}\nresult = (d.keys(), d.get('x', 0), d.items()[1])\n"),
            "(['h', 'cx'], 0, ('cx', 1))"
        );
        assert_eq!(eval("result = '-'.join(['a', 'b'])\n"), "'a-b'");
        assert_eq!(eval("result = ' a b '.split()\n"), "['a', 'b']");
        assert_eq!(eval("result = 'q_0'.replace('_', '').upper()\n"), "'Q0'");
        assert_eq!(eval("result = 'circuit'.startswith(('x', 'ci'))\n"), "True");
    }

    #[test]
    fn test_str_results_are_sized_before_building() {
        let err = run_err("t = 'a' * 1000000\ns = 'a' * 1000000\ns.replace('a', t)\n");
        assert_eq!(err.kind, ErrorKind::MemoryError);
        let err = run_err("''.join(['a' * 1000000] * 1000000)\n");
        assert_eq!(err.kind, ErrorKind::MemoryError);
        let err = run_err("('-' * 600000).join(['a', 'b', 'c'])\n");
        assert_eq!(err.kind, ErrorKind::MemoryError);
        assert_eq!(eval("result = 'abc'.replace('', 'x')\n"), "'abc'");
        assert_eq!(eval("result = ''.join([])\n"), "''");
    }

    #[test]
    fn test_attribute_restrictions() {
        let err = run_err("x = [1].__class__\n");
        assert_eq!(err.kind, ErrorKind::AttributeError);
        let err = run_err("import math\nmath.__dict__\n");
        assert_eq!(err.kind, ErrorKind::AttributeError);
        let err = run_err("qc = QuantumCircuit(1)\nqc.num_qubits = 5\n");
        assert_eq!(err.kind, ErrorKind::AttributeError);
        assert_eq!(
            err.message,
            "'QuantumCircuit' object attribute 'num_qubits' is read-only"
        );
        let err = run_err("qc = QuantumCircuit(1)\nqc.draw_mpl()\n");
        assert_eq!(
            err.message,
            "'QuantumCircuit' object has no attribute 'draw_mpl'"
        );
        let err = run_err("x = (1).real\n");
        assert_eq!(err.kind, ErrorKind::AttributeError);
    }

    #[test]
    fn test_gate_attributes() {
        assert_eq!(
            eval("g = RZGate(0.5)\nresult = (g.name, g.num_qubits, g.params)\n"),
            "('rz', 1, [0.5])"
        );
    }
}
