//! Runtime values.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use qvet_ir::{Circuit, GateSignature};

use crate::ast::FunctionDef;
use crate::capabilities::{Builtin, Class, Global, Module};
use crate::error::{ErrorKind, ScriptError, ScriptResult};

/// Shared, mutable circuit object as seen by scripts.
pub type CircuitHandle = Rc<RefCell<Circuit>>;

/// Deepest container nesting that comparison, hashing and rendering walk
/// through before raising `RecursionError`.
pub const MAX_VALUE_DEPTH: usize = 200;

/// Length at which [`Value::repr`] cuts its output short.
const DISPLAY_LIMIT: usize = 10_000;

/// A script value.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Items>>),
    Tuple(Rc<Items>),
    Dict(Rc<RefCell<Dict>>),
    Range(RangeValue),
    Function(Rc<Function>),
    Builtin(Builtin),
    Method(Rc<BoundMethod>),
    Module(Module),
    Class(Class),
    Gate(Rc<GateValue>),
    Circuit(CircuitHandle),
}

/// Elements of a list or tuple.
///
/// Dropping releases nested containers from a work list, so a value nested
/// a million levels deep frees without a million stack frames.
#[derive(Clone, Default)]
pub struct Items(Vec<Value>);

impl Items {
    pub fn into_vec(mut self) -> Vec<Value> {
        std::mem::take(&mut self.0)
    }
}

impl From<Vec<Value>> for Items {
    fn from(items: Vec<Value>) -> Self {
        Items(items)
    }
}

impl Deref for Items {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl DerefMut for Items {
    fn deref_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }
}

impl Drop for Items {
    fn drop(&mut self) {
        if !self.0.is_empty() {
            release(std::mem::take(&mut self.0));
        }
    }
}

/// Drop values, unpacking containers this is the last owner of onto the
/// work list instead of recursing into them.
fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(list) => {
                if let Ok(cell) = Rc::try_unwrap(list) {
                    let mut items = cell.into_inner();
                    pending.append(&mut items.0);
                }
            }
            Value::Tuple(tuple) => {
                if let Ok(mut items) = Rc::try_unwrap(tuple) {
                    pending.append(&mut items.0);
                }
            }
            Value::Dict(dict) => {
                if let Ok(cell) = Rc::try_unwrap(dict) {
                    let mut dict = cell.into_inner();
                    for (key, value) in dict.entries.drain(..) {
                        pending.push(key);
                        pending.push(value);
                    }
                }
            }
            Value::Method(method) => {
                if let Ok(method) = Rc::try_unwrap(method) {
                    pending.push(method.receiver);
                }
            }
            Value::Function(function) => {
                if let Ok(function) = Rc::try_unwrap(function) {
                    pending.extend(function.defaults.into_iter().flatten());
                }
            }
            _ => {}
        }
    }
}

fn too_deep() -> ScriptError {
    ScriptError::new(
        ErrorKind::RecursionError,
        "maximum recursion depth exceeded while walking a nested value",
    )
}

/// One level further into a nested value.
fn deeper(depth: usize) -> ScriptResult<usize> {
    depth.checked_sub(1).ok_or_else(too_deep)
}

/// Why rendering a value stopped early.
enum Overrun {
    Depth,
    Length,
}

/// A user-defined function with its evaluated defaults.
pub struct Function {
    pub(crate) def: Rc<FunctionDef>,
    pub(crate) defaults: Vec<Option<Value>>,
}

/// A method looked up on a receiver.
pub struct BoundMethod {
    pub(crate) receiver: Value,
    pub(crate) name: &'static str,
}

/// An instantiated gate object, e.g. `RZGate(0.5)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GateValue {
    pub signature: &'static GateSignature,
    pub params: Vec<f64>,
}

/// `range(start, stop, step)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let (lo, hi, step) = if self.step > 0 {
            (self.start, self.stop, self.step)
        } else {
            (self.stop, self.start, -self.step)
        };
        if lo >= hi {
            return 0;
        }
        let span = (i128::from(hi) - i128::from(lo) - 1) / i128::from(step) + 1;
        usize::try_from(span).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let offset = i64::try_from(index).ok()?.checked_mul(self.step)?;
        self.start.checked_add(offset)
    }

    pub fn contains(&self, v: i64) -> bool {
        let in_bounds = if self.step > 0 {
            v >= self.start && v < self.stop
        } else {
            v <= self.start && v > self.stop
        };
        in_bounds && (i128::from(v) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    pub fn iter(self) -> impl Iterator<Item = i64> {
        (0..self.len()).map_while(move |i| self.get(i))
    }
}

/// Hashable projection of a value used as a dict key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    Identity(usize),
}

impl HashKey {
    fn of(value: &Value) -> ScriptResult<Self> {
        Self::within(value, MAX_VALUE_DEPTH)
    }

    fn within(value: &Value, depth: usize) -> ScriptResult<Self> {
        Ok(match value {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(i64::from(*b)),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.2e18 {
                    #[allow(clippy::cast_possible_truncation)]
                    let whole = *f as i64;
                    HashKey::Int(whole)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => {
                let depth = deeper(depth)?;
                HashKey::Tuple(
                    items
                        .iter()
                        .map(|item| HashKey::within(item, depth))
                        .collect::<ScriptResult<_>>()?,
                )
            }
            Value::Range(r) => HashKey::Tuple(vec![
                HashKey::Int(r.start),
                HashKey::Int(r.stop),
                HashKey::Int(r.step),
            ]),
            Value::Circuit(c) => HashKey::Identity(Rc::as_ptr(c) as *const () as usize),
            Value::Gate(g) => HashKey::Identity(Rc::as_ptr(g) as *const () as usize),
            Value::Function(f) => HashKey::Identity(Rc::as_ptr(f) as *const () as usize),
            Value::Builtin(_) | Value::Class(_) | Value::Module(_) => {
                HashKey::Str(Rc::from(value.repr()))
            }
            Value::List(_) | Value::Dict(_) | Value::Method(_) => {
                return Err(ScriptError::type_error(format!(
                    "unhashable type: '{}'",
                    value.type_name()
                )));
            }
        })
    }
}

/// Insertion-ordered dictionary.
#[derive(Clone, Default)]
pub struct Dict {
    index: FxHashMap<HashKey, usize>,
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> ScriptResult<Option<&Value>> {
        let hk = HashKey::of(key)?;
        Ok(self.index.get(&hk).map(|&i| &self.entries[i].1))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> ScriptResult<()> {
        let hk = HashKey::of(&key)?;
        match self.index.get(&hk) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hk, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn contains(&self, key: &Value) -> ScriptResult<bool> {
        Ok(self.index.contains_key(&HashKey::of(key)?))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

impl Drop for Dict {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            let pending = self
                .entries
                .drain(..)
                .flat_map(|(key, value)| [key, value])
                .collect();
            release(pending);
        }
    }
}

impl From<Global> for Value {
    fn from(global: Global) -> Self {
        match global {
            Global::Builtin(b) => Value::Builtin(b),
            Global::Class(c) => Value::Class(c),
            Global::Module(m) => Value::Module(m),
            Global::Constant(v) => Value::Float(v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(Items(items))))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(Items(items)))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    /// Elements this value holds directly, counting string characters.
    pub fn footprint(&self) -> usize {
        match self {
            Value::Str(s) => s.len(),
            Value::List(l) => l.borrow().len(),
            Value::Tuple(t) => t.len(),
            Value::Dict(d) => d.borrow().len(),
            _ => 0,
        }
    }

    /// Circuit held by this value, if it is one.
    pub fn as_circuit(&self) -> Option<&CircuitHandle> {
        match self {
            Value::Circuit(c) => Some(c),
            _ => None,
        }
    }

    /// Type name as a script author would see it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(_) => "method",
            Value::Module(_) => "module",
            Value::Class(_) => "type",
            Value::Gate(g) => g.signature.class_name,
            Value::Circuit(_) => "QuantumCircuit",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Range(r) => !r.is_empty(),
            _ => true,
        }
    }

    /// Numeric view: `bool`, `int` and `float` all qualify.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view: `bool` and `int` only.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn expect_int(&self, what: &str) -> ScriptResult<i64> {
        self.as_int().ok_or_else(|| {
            ScriptError::type_error(format!(
                "{what} must be an integer, not '{}'",
                self.type_name()
            ))
        })
    }

    pub fn expect_f64(&self, what: &str) -> ScriptResult<f64> {
        self.as_f64().ok_or_else(|| {
            ScriptError::type_error(format!(
                "{what} must be a real number, not '{}'",
                self.type_name()
            ))
        })
    }

    /// `is` comparison.
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Gate(a), Value::Gate(b)) => Rc::ptr_eq(a, b),
            (Value::Circuit(a), Value::Circuit(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            _ => false,
        }
    }

    /// `==` comparison.
    pub fn equals(&self, other: &Value) -> ScriptResult<bool> {
        self.equals_within(other, MAX_VALUE_DEPTH)
    }

    fn equals_within(&self, other: &Value, depth: usize) -> ScriptResult<bool> {
        Ok(match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_equals(&a.borrow(), &b.borrow(), deeper(depth)?)?
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_equals(a, b, deeper(depth)?)?,
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let depth = deeper(depth)?;
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (key, value) in a.iter() {
                    match b.get(key)? {
                        Some(other) if value.equals_within(other, depth)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Gate(a), Value::Gate(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => match (self.as_int(), other.as_int()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a == b,
                },
                _ => self.is(other),
            },
        })
    }

    /// Ordering for `<` and friends; `TypeError` when the types do not order.
    pub fn compare(&self, other: &Value) -> ScriptResult<Ordering> {
        self.compare_within(other, MAX_VALUE_DEPTH)
    }

    fn compare_within(&self, other: &Value, depth: usize) -> ScriptResult<Ordering> {
        let unorderable = || {
            ScriptError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))
        };
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                seq_compare(&a.borrow(), &b.borrow(), deeper(depth)?)
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_compare(a, b, deeper(depth)?),
            _ => match (self.as_int(), other.as_int()) {
                (Some(x), Some(y)) => Ok(x.cmp(&y)),
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                        ScriptError::new(ErrorKind::ValueError, "cannot order NaN")
                    }),
                    _ => Err(unorderable()),
                },
            },
        }
    }

    /// `str(value)`.
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }

    /// `repr(value)`, cut short with `...` past a display limit or when
    /// nested too deeply. Meant for messages; scripts go through
    /// [`Value::checked_repr`].
    pub fn repr(&self) -> String {
        let mut out = String::new();
        if self
            .write_repr(&mut out, &mut Vec::new(), MAX_VALUE_DEPTH, DISPLAY_LIMIT)
            .is_err()
        {
            out.push_str("...");
        }
        out
    }

    /// `repr(value)` refusing output longer than `max_len` characters.
    pub fn checked_repr(&self, max_len: usize) -> ScriptResult<String> {
        let mut out = String::new();
        match self.write_repr(&mut out, &mut Vec::new(), MAX_VALUE_DEPTH, max_len) {
            Ok(()) if out.len() <= max_len => Ok(out),
            Err(Overrun::Depth) => Err(too_deep()),
            _ => Err(ScriptError::memory_error(format!(
                "string representation exceeds the limit of {max_len} characters"
            ))),
        }
    }

    /// `str(value)` refusing output longer than `max_len` characters.
    pub fn checked_str(&self, max_len: usize) -> ScriptResult<String> {
        match self {
            Value::Str(s) => Ok(s.to_string()),
            other => other.checked_repr(max_len),
        }
    }

    fn write_repr(
        &self,
        out: &mut String,
        seen: &mut Vec<usize>,
        depth: usize,
        max_len: usize,
    ) -> Result<(), Overrun> {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) => out.push_str(&quote_str(s)),
            Value::List(items) => {
                let ptr = Rc::as_ptr(items) as *const () as usize;
                if seen.contains(&ptr) {
                    out.push_str("[...]");
                    return Ok(());
                }
                let depth = depth.checked_sub(1).ok_or(Overrun::Depth)?;
                seen.push(ptr);
                out.push('[');
                write_items(&items.borrow(), out, seen, depth, max_len)?;
                out.push(']');
                seen.pop();
            }
            Value::Tuple(items) => {
                let depth = depth.checked_sub(1).ok_or(Overrun::Depth)?;
                out.push('(');
                write_items(items, out, seen, depth, max_len)?;
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(dict) => {
                let ptr = Rc::as_ptr(dict) as *const () as usize;
                if seen.contains(&ptr) {
                    out.push_str("{...}");
                    return Ok(());
                }
                let depth = depth.checked_sub(1).ok_or(Overrun::Depth)?;
                seen.push(ptr);
                out.push('{');
                for (i, (k, v)) in dict.borrow().iter().enumerate() {
                    if out.len() > max_len {
                        return Err(Overrun::Length);
                    }
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write_repr(out, seen, depth, max_len)?;
                    out.push_str(": ");
                    v.write_repr(out, seen, depth, max_len)?;
                }
                out.push('}');
                seen.pop();
            }
            Value::Range(r) => {
                if r.step == 1 {
                    let _ = write!(out, "range({}, {})", r.start, r.stop);
                } else {
                    let _ = write!(out, "range({}, {}, {})", r.start, r.stop, r.step);
                }
            }
            Value::Function(f) => {
                let _ = write!(out, "<function {}>", f.def.name);
            }
            Value::Builtin(b) => {
                let _ = write!(out, "<built-in function {}>", b.name());
            }
            Value::Method(m) => {
                let _ = write!(
                    out,
                    "<bound method {}.{}>",
                    m.receiver.type_name(),
                    m.name
                );
            }
            Value::Module(m) => {
                let _ = write!(out, "<module '{}'>", m.path());
            }
            Value::Class(c) => {
                let _ = write!(out, "<class '{}'>", c.name());
            }
            Value::Gate(g) => {
                out.push_str("Instruction(name='");
                out.push_str(g.signature.name);
                let _ = write!(
                    out,
                    "', num_qubits={}, params=[",
                    g.signature.num_qubits
                );
                for (i, p) in g.params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&format_float(*p));
                }
                out.push_str("])");
            }
            Value::Circuit(c) => {
                let c = c.borrow();
                let _ = write!(
                    out,
                    "QuantumCircuit(name='{}', num_qubits={}, num_clbits={}, size={})",
                    c.name(),
                    c.num_qubits(),
                    c.num_clbits(),
                    c.size()
                );
            }
        }
        Ok(())
    }
}

fn write_items(
    items: &[Value],
    out: &mut String,
    seen: &mut Vec<usize>,
    depth: usize,
    max_len: usize,
) -> Result<(), Overrun> {
    for (i, item) in items.iter().enumerate() {
        if out.len() > max_len {
            return Err(Overrun::Length);
        }
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, seen, depth, max_len)?;
    }
    Ok(())
}

fn seq_equals(a: &[Value], b: &[Value], depth: usize) -> ScriptResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.equals_within(y, depth)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn seq_compare(a: &[Value], b: &[Value], depth: usize) -> ScriptResult<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !x.equals_within(y, depth)? {
            return x.compare_within(y, depth);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Float formatting close to what script authors expect (`1.0`, `0.1`, `inf`).
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if f.fract() == 0.0 && f.abs() < 1e16 {
        return format!("{f:.1}");
    }
    format!("{f:?}")
}

fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}
