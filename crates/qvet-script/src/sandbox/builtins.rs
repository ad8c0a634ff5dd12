//! Builtin functions and the `math` module.

use std::cmp::Ordering;

use super::value::{Dict, RangeValue, Value};
use super::{CallArgs, Interpreter, ops};
use crate::ast::BinaryOp;
use crate::capabilities::{Builtin, Class, MathFn};
use crate::error::{ErrorKind, ScriptError, ScriptResult};

pub(super) fn call(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    mut args: CallArgs,
) -> ScriptResult<Value> {
    let name = builtin.name();
    match builtin {
        Builtin::Print => return print(interp, args),
        Builtin::Dict => return dict(interp, args),
        Builtin::Min | Builtin::Max => return min_max(interp, builtin, args),
        Builtin::Sum => return sum(interp, args),
        Builtin::Enumerate => return enumerate(interp, args),
        Builtin::Sorted => return sorted(interp, args),
        Builtin::Zip => return zip(interp, args),
        Builtin::Round => return round(args),
        _ => {}
    }
    args.no_more_keywords(name)?;
    let mut positional = args.positional.into_iter();

    match builtin {
        Builtin::Range => {
            let bounds = positional
                .map(|v| index_int(&v))
                .collect::<ScriptResult<Vec<_>>>()?;
            let (start, stop, step) = match bounds.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                other => {
                    return Err(ScriptError::type_error(format!(
                        "range expected at least 1 argument, got {}",
                        other.len()
                    )));
                }
            };
            if step == 0 {
                return Err(ScriptError::value_error("range() arg 3 must not be zero"));
            }
            Ok(Value::Range(RangeValue { start, stop, step }))
        }
        Builtin::Len => {
            let [value] = exactly::<1>(name, positional)?;
            let len = match &value {
                Value::Str(s) => s.chars().count(),
                Value::List(l) => l.borrow().len(),
                Value::Tuple(t) => t.len(),
                Value::Dict(d) => d.borrow().len(),
                Value::Range(r) => r.len(),
                Value::Circuit(c) => c.borrow().size(),
                other => {
                    return Err(ScriptError::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Int(i64::try_from(len).map_err(|_| ScriptError::overflow())?))
        }
        Builtin::Int => match optional(name, positional)? {
            None => Ok(Value::Int(0)),
            Some(Value::Str(s)) => {
                let text = s.trim().replace('_', "");
                text.parse::<i64>().map(Value::Int).map_err(|_| {
                    ScriptError::value_error(format!(
                        "invalid literal for int() with base 10: {}",
                        Value::Str(s.clone()).repr()
                    ))
                })
            }
            Some(Value::Float(f)) => float_to_int(f).map(Value::Int),
            Some(v) => Ok(Value::Int(v.as_int().ok_or_else(|| {
                ScriptError::type_error(format!(
                    "int() argument must be a string or a real number, not '{}'",
                    v.type_name()
                ))
            })?)),
        },
        Builtin::Float => match optional(name, positional)? {
            None => Ok(Value::Float(0.0)),
            Some(Value::Str(s)) => parse_float(&s).map(Value::Float).ok_or_else(|| {
                ScriptError::value_error(format!(
                    "could not convert string to float: {}",
                    Value::Str(s.clone()).repr()
                ))
            }),
            Some(v) => Ok(Value::Float(v.as_f64().ok_or_else(|| {
                ScriptError::type_error(format!(
                    "float() argument must be a string or a real number, not '{}'",
                    v.type_name()
                ))
            })?)),
        },
        Builtin::Str => Ok(match optional(name, positional)? {
            None => Value::from(""),
            Some(v @ Value::Str(_)) => v,
            Some(v) => Value::from(v.checked_str(interp.limits.max_collection_len)?),
        }),
        Builtin::Bool => Ok(Value::Bool(
            optional(name, positional)?.is_some_and(|v| v.truthy()),
        )),
        Builtin::List => Ok(Value::list(match optional(name, positional)? {
            None => Vec::new(),
            Some(v) => interp.collect_values(&v)?,
        })),
        Builtin::Tuple => Ok(match optional(name, positional)? {
            None => Value::tuple(Vec::new()),
            Some(v @ Value::Tuple(_)) => v,
            Some(v) => Value::tuple(interp.collect_values(&v)?),
        }),
        Builtin::Abs => {
            let [value] = exactly::<1>(name, positional)?;
            match value {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => match v.as_int() {
                    Some(i) => i.checked_abs().map(Value::Int).ok_or_else(ScriptError::overflow),
                    None => Err(ScriptError::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        v.type_name()
                    ))),
                },
            }
        }
        Builtin::Reversed => {
            let [value] = exactly::<1>(name, positional)?;
            if matches!(value, Value::Dict(_)) {
                return Err(ScriptError::type_error("'dict' object is not reversible"));
            }
            let mut items = interp.collect_values(&value)?;
            items.reverse();
            Ok(Value::list(items))
        }
        Builtin::Isinstance => {
            let [value, classinfo] = exactly::<2>(name, positional)?;
            isinstance(&value, &classinfo).map(Value::Bool)
        }
        Builtin::Math(f) => math(f, positional.collect()),
        Builtin::Print
        | Builtin::Dict
        | Builtin::Min
        | Builtin::Max
        | Builtin::Sum
        | Builtin::Enumerate
        | Builtin::Sorted
        | Builtin::Zip
        | Builtin::Round => Err(ScriptError::internal(format!("{name}() dispatched twice"))),
    }
}

fn exactly<const N: usize>(
    function: &str,
    args: std::vec::IntoIter<Value>,
) -> ScriptResult<[Value; N]> {
    let args: Vec<Value> = args.collect();
    let given = args.len();
    args.try_into().map_err(|_| {
        ScriptError::type_error(format!(
            "{function}() takes exactly {N} argument{} ({given} given)",
            if N == 1 { "" } else { "s" }
        ))
    })
}

fn optional(function: &str, mut args: std::vec::IntoIter<Value>) -> ScriptResult<Option<Value>> {
    let first = args.next();
    if args.next().is_some() {
        return Err(ScriptError::type_error(format!(
            "{function}() takes at most 1 argument"
        )));
    }
    Ok(first)
}

/// Integer operand for `range`, indices and counts.
pub(super) fn index_int(value: &Value) -> ScriptResult<i64> {
    value.as_int().ok_or_else(|| {
        ScriptError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

pub(super) fn float_to_int(f: f64) -> ScriptResult<i64> {
    if f.is_nan() {
        return Err(ScriptError::value_error(
            "cannot convert float NaN to integer",
        ));
    }
    if f.is_infinite() {
        return Err(ScriptError::new(
            ErrorKind::OverflowError,
            "cannot convert float infinity to integer",
        ));
    }
    let truncated = f.trunc();
    #[allow(clippy::cast_precision_loss)]
    let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
    if !in_range {
        return Err(ScriptError::overflow());
    }
    #[allow(clippy::cast_possible_truncation)]
    let value = truncated as i64;
    Ok(value)
}

fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim().replace('_', "");
    match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" | "+nan" | "-nan" => Some(f64::NAN),
        other if other.contains(|c: char| c.is_ascii_digit()) => other.parse().ok(),
        _ => None,
    }
}

/// Materialize an iterable, charging one step per element.
fn materialize(interp: &mut Interpreter<'_>, value: &Value) -> ScriptResult<Vec<Value>> {
    let items = interp.collect_values(value)?;
    for _ in &items {
        interp.tick()?;
    }
    Ok(items)
}

fn print(interp: &mut Interpreter<'_>, mut args: CallArgs) -> ScriptResult<Value> {
    let mut text_kwarg = |name: &str, default: &str| -> ScriptResult<String> {
        match args.take_keyword(name) {
            None | Some(Value::None) => Ok(default.to_string()),
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(other) => Err(ScriptError::type_error(format!(
                "{name} must be None or a string, not {}",
                other.type_name()
            ))),
        }
    };
    let sep = text_kwarg("sep", " ")?;
    let end = text_kwarg("end", "\n")?;
    args.take_keyword("flush");
    args.no_more_keywords("print")?;

    let max_len = interp.limits.max_collection_len;
    for (i, value) in args.positional.iter().enumerate() {
        if i > 0 {
            interp.write_stdout(&sep);
        }
        interp.write_stdout(&value.checked_str(max_len)?);
    }
    interp.write_stdout(&end);
    Ok(Value::None)
}

fn dict(interp: &mut Interpreter<'_>, mut args: CallArgs) -> ScriptResult<Value> {
    args.arity("dict", 0, 1)?;
    let mut out = Dict::new();
    if let Some(source) = args.positional.pop() {
        match &source {
            Value::Dict(d) => out = d.borrow().clone(),
            other => {
                for pair in materialize(interp, other)? {
                    let items = interp.collect_values(&pair)?;
                    let [key, value]: [Value; 2] = items.try_into().map_err(|items: Vec<_>| {
                        ScriptError::value_error(format!(
                            "dictionary update sequence element has length {}; 2 is required",
                            items.len()
                        ))
                    })?;
                    out.insert(key, value)?;
                }
            }
        }
    }
    for (key, value) in std::mem::take(&mut args.keywords) {
        out.insert(Value::from(key), value)?;
    }
    Ok(Value::dict(out))
}

fn min_max(interp: &mut Interpreter<'_>, builtin: Builtin, mut args: CallArgs) -> ScriptResult<Value> {
    let name = builtin.name();
    let default = args.take_keyword("default");
    args.no_more_keywords(name)?;
    let candidates = match args.positional.len() {
        0 => {
            return Err(ScriptError::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        1 => materialize(interp, &args.positional[0])?,
        _ => std::mem::take(&mut args.positional),
    };
    let wanted = if builtin == Builtin::Min {
        Ordering::Less
    } else {
        Ordering::Greater
    };

    let mut best: Option<Value> = None;
    for item in candidates {
        best = Some(match best {
            None => item,
            Some(current) => {
                if item.compare(&current)? == wanted {
                    item
                } else {
                    current
                }
            }
        });
    }
    best.or(default).ok_or_else(|| {
        ScriptError::value_error(format!("{name}() arg is an empty sequence"))
    })
}

fn sum(interp: &mut Interpreter<'_>, mut args: CallArgs) -> ScriptResult<Value> {
    let keyword_start = args.take_keyword("start");
    args.no_more_keywords("sum")?;
    args.arity("sum", 1, 2)?;
    let start = args
        .positional
        .get(1)
        .cloned()
        .or(keyword_start)
        .unwrap_or(Value::Int(0));
    if matches!(start, Value::Str(_)) {
        return Err(ScriptError::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    let items = materialize(interp, &args.positional[0])?;
    items.iter().try_fold(start, |acc, item| {
        ops::binary(BinaryOp::Add, &acc, item, interp.limits.max_collection_len)
    })
}

fn enumerate(interp: &mut Interpreter<'_>, mut args: CallArgs) -> ScriptResult<Value> {
    let keyword_start = args.take_keyword("start");
    args.no_more_keywords("enumerate")?;
    args.arity("enumerate", 1, 2)?;
    let start = match args.positional.get(1).or(keyword_start.as_ref()) {
        Some(v) => index_int(v)?,
        None => 0,
    };
    let items = materialize(interp, &args.positional[0])?;
    let mut out = Vec::with_capacity(items.len());
    for (offset, item) in items.into_iter().enumerate() {
        let index = i64::try_from(offset)
            .ok()
            .and_then(|o| start.checked_add(o))
            .ok_or_else(ScriptError::overflow)?;
        out.push(Value::tuple(vec![Value::Int(index), item]));
    }
    Ok(Value::list(out))
}

fn zip(interp: &mut Interpreter<'_>, mut args: CallArgs) -> ScriptResult<Value> {
    args.take_keyword("strict");
    args.no_more_keywords("zip")?;
    let columns = args
        .positional
        .iter()
        .map(|v| materialize(interp, v))
        .collect::<ScriptResult<Vec<_>>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let out = (0..rows)
        .map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
        .collect();
    Ok(Value::list(out))
}

fn round(mut args: CallArgs) -> ScriptResult<Value> {
    let keyword_digits = args.take_keyword("ndigits");
    args.no_more_keywords("round")?;
    args.arity("round", 1, 2)?;
    let digits = match args.positional.get(1).or(keyword_digits.as_ref()) {
        None | Some(Value::None) => None,
        Some(v) => Some(index_int(v)?),
    };
    let value = &args.positional[0];
    match (value, digits) {
        (Value::Float(f), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Value::Float(f), Some(n)) => {
            let n = i32::try_from(n.clamp(-308, 308)).unwrap_or(0);
            let scale = 10f64.powi(n);
            let scaled = f * scale;
            if !scaled.is_finite() {
                return Ok(Value::Float(*f));
            }
            Ok(Value::Float(scaled.round_ties_even() / scale))
        }
        (v, _) => match v.as_int() {
            Some(i) => Ok(Value::Int(i)),
            None => Err(ScriptError::type_error(format!(
                "type {} doesn't define __round__ method",
                v.type_name()
            ))),
        },
    }
}

fn sorted(interp: &mut Interpreter<'_>, mut args: CallArgs) -> ScriptResult<Value> {
    let reverse = args.take_keyword("reverse").is_some_and(|v| v.truthy());
    args.no_more_keywords("sorted")?;
    args.arity("sorted", 1, 1)?;
    let mut items = materialize(interp, &args.positional[0])?;
    sort_values(&mut items, reverse)?;
    Ok(Value::list(items))
}

/// Stable sort that surfaces the first comparison error.
pub(super) fn sort_values(items: &mut [Value], reverse: bool) -> ScriptResult<()> {
    let mut failure = None;
    items.sort_by(|a, b| {
        let ordering = if reverse { b.compare(a) } else { a.compare(b) };
        ordering.unwrap_or_else(|err| {
            failure.get_or_insert(err);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}

fn isinstance(value: &Value, classinfo: &Value) -> ScriptResult<bool> {
    match classinfo {
        Value::Tuple(options) => {
            for option in options.iter() {
                if isinstance(value, option)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Class(Class::QuantumCircuit) => Ok(matches!(value, Value::Circuit(_))),
        Value::Class(Class::Gate(sig)) => {
            Ok(matches!(value, Value::Gate(g) if g.signature == *sig))
        }
        Value::Builtin(b) => match b {
            Builtin::Int => Ok(matches!(value, Value::Int(_) | Value::Bool(_))),
            Builtin::Float => Ok(matches!(value, Value::Float(_))),
            Builtin::Str => Ok(matches!(value, Value::Str(_))),
            Builtin::Bool => Ok(matches!(value, Value::Bool(_))),
            Builtin::List => Ok(matches!(value, Value::List(_))),
            Builtin::Dict => Ok(matches!(value, Value::Dict(_))),
            Builtin::Tuple => Ok(matches!(value, Value::Tuple(_))),
            Builtin::Range => Ok(matches!(value, Value::Range(_))),
            _ => Err(not_a_type()),
        },
        _ => Err(not_a_type()),
    }
}

fn not_a_type() -> ScriptError {
    ScriptError::type_error("isinstance() arg 2 must be a type or tuple of types")
}

fn domain_error() -> ScriptError {
    ScriptError::value_error("math domain error")
}

fn math(function: MathFn, args: Vec<Value>) -> ScriptResult<Value> {
    let name = function.name();
    let (min, max) = match function {
        MathFn::Atan2 | MathFn::Pow => (2, 2),
        MathFn::Log => (1, 2),
        _ => (1, 1),
    };
    CallArgs::positional(args.clone()).arity(name, min, max)?;
    let x = args
        .iter()
        .map(|v| v.expect_f64(&format!("{name}() argument")))
        .collect::<ScriptResult<Vec<f64>>>()?;
    let a = x[0];

    let result = match function {
        MathFn::Sqrt if a < 0.0 => return Err(domain_error()),
        MathFn::Sqrt => a.sqrt(),
        MathFn::Sin | MathFn::Cos | MathFn::Tan if a.is_infinite() => {
            return Err(domain_error());
        }
        MathFn::Sin => a.sin(),
        MathFn::Cos => a.cos(),
        MathFn::Tan => a.tan(),
        MathFn::Asin | MathFn::Acos if !(-1.0..=1.0).contains(&a) => return Err(domain_error()),
        MathFn::Asin => a.asin(),
        MathFn::Acos => a.acos(),
        MathFn::Atan => a.atan(),
        MathFn::Atan2 => a.atan2(x[1]),
        MathFn::Exp => a.exp(),
        MathFn::Log | MathFn::Log2 | MathFn::Log10 if a <= 0.0 => return Err(domain_error()),
        MathFn::Log => match x.get(1) {
            Some(&base) if base <= 0.0 || base == 1.0 => return Err(domain_error()),
            Some(&base) => a.ln() / base.ln(),
            None => a.ln(),
        },
        MathFn::Log2 => a.log2(),
        MathFn::Log10 => a.log10(),
        MathFn::Floor => return float_to_int(a.floor()).map(Value::Int),
        MathFn::Ceil => return float_to_int(a.ceil()).map(Value::Int),
        MathFn::Fabs => a.abs(),
        MathFn::Pow => {
            let b = x[1];
            if a < 0.0 && b.fract() != 0.0 && b.is_finite() {
                return Err(domain_error());
            }
            a.powf(b)
        }
        MathFn::Radians => a.to_radians(),
        MathFn::Degrees => a.to_degrees(),
    };

    if result.is_infinite() && x.iter().all(|v| v.is_finite()) {
        return Err(ScriptError::new(ErrorKind::OverflowError, "math range error"));
    }
    Ok(Value::Float(result))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{run, run_err};
    use crate::error::ErrorKind;

    fn eval(expr: &str) -> String {
        let exec = run(&format!("result = {expr}\n")).unwrap();
        exec.bindings().get("result").unwrap().repr()
    }

    #[test]
    fn test_range_and_len() {
        assert_eq!(eval("list(range(2, 11, 3))"), "[2, 5, 8]");
        assert_eq!(eval("len(range(0, 10, 3))"), "4");
        assert_eq!(eval("len('héllo')"), "5");
        let err = run_err("range(1, 2, 0)\n");
        assert_eq!(err.kind, ErrorKind::ValueError);
        assert_eq!(err.message, "range() arg 3 must not be zero");
        assert_eq!(run_err("range(1.5)\n").kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval("int(' 42 ')"), "42");
        assert_eq!(eval("int(-2.9)"), "-2");
        assert_eq!(eval("float('1e3')"), "1000.0");
        assert_eq!(eval("str(1.5) + str(True)"), "'1.5True'");
        assert_eq!(eval("bool([])"), "False");
        assert_eq!(eval("tuple([1, 2])"), "(1, 2)");
        assert_eq!(run_err("int('abc')\n").kind, ErrorKind::ValueError);
        assert_eq!(run_err("int(float('inf'))\n").kind, ErrorKind::OverflowError);
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(eval("min([3, 1, 2])"), "1");
        assert_eq!(eval("max(3, 7, 5)"), "7");
        assert_eq!(eval("max([], default=-1)"), "-1");
        assert_eq!(eval("sum(range(5))"), "10");
        assert_eq!(eval("sum([0.5, 0.25], 1)"), "1.75");
        let err = run_err("min([])\n");
        assert_eq!(err.message, "min() arg is an empty sequence");
    }

    #[test]
    fn test_sequence_helpers() {
        assert_eq!(eval("enumerate('ab', 1)"), "[(1, 'a'), (2, 'b')]");
        assert_eq!(eval("zip([1, 2, 3], 'xy')"), "[(1, 'x'), (2, 'y')]");
        assert_eq!(eval("reversed(range(3))"), "[2, 1, 0]");
        assert_eq!(eval("sorted([3, 1, 2], reverse=True)"), "[3, 2, 1]");
        assert_eq!(eval("dict([('a', 1)], b=2)"), "{'a': 1, 'b': 2}");
        assert_eq!(run_err("sorted([1, 'a'])\n").kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_round_uses_bankers_rounding() {
        assert_eq!(eval("round(2.5)"), "2");
        assert_eq!(eval("round(3.5)"), "4");
        assert_eq!(eval("round(0.125, 2)"), "0.12");
        assert_eq!(eval("round(7)"), "7");
    }

    #[test]
    fn test_isinstance() {
        assert_eq!(eval("isinstance(True, int)"), "True");
        assert_eq!(eval("isinstance(1.0, (int, str))"), "False");
        assert_eq!(eval("isinstance(QuantumCircuit(1), QuantumCircuit)"), "True");
        assert_eq!(eval("isinstance(RZGate(0.1), RZGate)"), "True");
        assert_eq!(run_err("isinstance(1, 2)\n").kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_math() {
        assert_eq!(eval("math.sqrt(16)"), "4.0");
        assert_eq!(eval("math.floor(-0.5)"), "-1");
        assert_eq!(eval("math.log(8, 2)"), "3.0");
        assert_eq!(eval("math.degrees(math.pi)"), "180.0");
        let err = run_err("import math\nmath.sqrt(-1)\n");
        assert_eq!(err.kind, ErrorKind::ValueError);
        assert_eq!(err.message, "math domain error");
        assert_eq!(run_err("math.exp(1000)\n").kind, ErrorKind::OverflowError);
    }
}
