//! Operators.

use std::cmp::Ordering;

use super::value::Value;
use crate::ast::{BinaryOp, CompareOp, UnaryOp};
use crate::error::{ErrorKind, ScriptError, ScriptResult};

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> ScriptError {
    ScriptError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn limited(len: usize, max_len: usize) -> ScriptResult<()> {
    if len > max_len {
        return Err(ScriptError::memory_error(format!(
            "collection of {len} elements exceeds the limit of {max_len}"
        )));
    }
    Ok(())
}

fn repeat_count(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}

fn repeated<T: Clone>(items: &[T], times: usize, max_len: usize) -> ScriptResult<Vec<T>> {
    limited(items.len().saturating_mul(times), max_len)?;
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

/// Evaluate `left op right`.
pub(super) fn binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    max_len: usize,
) -> ScriptResult<Value> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            limited(a.len() + b.len(), max_len)?;
            Ok(Value::from(format!("{a}{b}")))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            limited(a.len() + b.len(), max_len)?;
            Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            limited(a.len() + b.len(), max_len)?;
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), n) | (BinaryOp::Mul, n, Value::Str(s))
            if n.as_int().is_some() =>
        {
            let times = repeat_count(n.as_int().unwrap_or(0));
            limited(s.len().saturating_mul(times), max_len)?;
            Ok(Value::from(s.repeat(times)))
        }
        (BinaryOp::Mul, Value::List(l), n) | (BinaryOp::Mul, n, Value::List(l))
            if n.as_int().is_some() =>
        {
            let times = repeat_count(n.as_int().unwrap_or(0));
            Ok(Value::list(repeated(&l.borrow(), times, max_len)?))
        }
        (BinaryOp::Mul, Value::Tuple(t), n) | (BinaryOp::Mul, n, Value::Tuple(t))
            if n.as_int().is_some() =>
        {
            let times = repeat_count(n.as_int().unwrap_or(0));
            Ok(Value::tuple(repeated(t, times, max_len)?))
        }
        (
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor,
            Value::Bool(a),
            Value::Bool(b),
        ) => Ok(Value::Bool(match op {
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitOr => a | b,
            _ => a ^ b,
        })),
        _ => arithmetic(op, left, right),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return int_op(op, a, b).map_err(|err| {
            if err.kind == ErrorKind::TypeError {
                unsupported(op, left, right)
            } else {
                err
            }
        });
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => float_op(op, a, b).map_err(|err| {
            if err.kind == ErrorKind::TypeError {
                unsupported(op, left, right)
            } else {
                err
            }
        }),
        _ => Err(unsupported(op, left, right)),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> ScriptResult<Value> {
    let overflow = ScriptError::overflow;
    let v = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        #[allow(clippy::cast_precision_loss)]
        BinaryOp::Div => {
            if b == 0 {
                return Err(ScriptError::zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ScriptError::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ScriptError::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                return float_op(BinaryOp::Pow, a as f64, b as f64);
            }
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).ok_or_else(overflow)?
        }
        BinaryOp::LShift => {
            if b < 0 {
                return Err(ScriptError::value_error("negative shift count"));
            }
            if a == 0 {
                0
            } else if b >= 64 {
                return Err(overflow());
            } else {
                let shifted = i128::from(a) << b;
                i64::try_from(shifted).map_err(|_| overflow())?
            }
        }
        BinaryOp::RShift => {
            if b < 0 {
                return Err(ScriptError::value_error("negative shift count"));
            }
            if b >= 64 {
                if a < 0 { -1 } else { 0 }
            } else {
                a >> b
            }
        }
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::MatMul => return Err(ScriptError::type_error("matmul")),
    };
    Ok(Value::Int(v))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> ScriptResult<Value> {
    let v = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ScriptError::zero_division("float division by zero"));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(ScriptError::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(ScriptError::zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(ScriptError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(ScriptError::value_error(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            let v = a.powf(b);
            if v.is_infinite() && a.is_finite() && b.is_finite() {
                return Err(ScriptError::new(
                    ErrorKind::OverflowError,
                    "numerical result out of range",
                ));
            }
            v
        }
        _ => return Err(ScriptError::type_error("bitwise operation on float")),
    };
    Ok(Value::Float(v))
}

/// Evaluate a unary operator.
pub(super) fn unary(op: UnaryOp, operand: &Value) -> ScriptResult<Value> {
    let bad = || {
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        };
        ScriptError::type_error(format!(
            "bad operand type for unary {symbol}: '{}'",
            operand.type_name()
        ))
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOp::Neg => match operand {
            Value::Float(f) => Ok(Value::Float(-f)),
            v => {
                let i = v.as_int().ok_or_else(bad)?;
                Ok(Value::Int(i.checked_neg().ok_or_else(ScriptError::overflow)?))
            }
        },
        UnaryOp::Pos => match operand {
            Value::Float(f) => Ok(Value::Float(*f)),
            v => Ok(Value::Int(v.as_int().ok_or_else(bad)?)),
        },
        UnaryOp::Invert => Ok(Value::Int(!operand.as_int().ok_or_else(bad)?)),
    }
}

fn any_equal(items: &[Value], item: &Value) -> ScriptResult<bool> {
    for candidate in items {
        if candidate.equals(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `item in container`.
pub(super) fn contains(container: &Value, item: &Value) -> ScriptResult<bool> {
    match container {
        Value::List(items) => any_equal(&items.borrow(), item),
        Value::Tuple(items) => any_equal(items, item),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_ref())),
            other => Err(ScriptError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(d) => d.borrow().contains(item),
        Value::Range(r) => Ok(match item {
            Value::Float(f) if f.fract() == 0.0 => {
                #[allow(clippy::cast_possible_truncation)]
                let whole = *f as i64;
                r.contains(whole)
            }
            other => other.as_int().is_some_and(|v| r.contains(v)),
        }),
        other => Err(ScriptError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Evaluate one link of a comparison chain.
pub(super) fn compare(op: CompareOp, left: &Value, right: &Value) -> ScriptResult<bool> {
    Ok(match op {
        CompareOp::Eq => left.equals(right)?,
        CompareOp::NotEq => !left.equals(right)?,
        CompareOp::Lt => left.compare(right)? == Ordering::Less,
        CompareOp::LtEq => left.compare(right)? != Ordering::Greater,
        CompareOp::Gt => left.compare(right)? == Ordering::Greater,
        CompareOp::GtEq => left.compare(right)? != Ordering::Less,
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
        CompareOp::Is => left.is(right),
        CompareOp::IsNot => !left.is(right),
    })
}
