//! Capability-scoped interpreter for circuit scripts.
//!
//! Each execution gets a fresh global namespace. Names resolve through the
//! execution's own bindings and then the shared [`Capabilities`]; nothing
//! else is reachable. Every statement and expression evaluation costs one
//! step, and the step budget, call depth, collection sizes, circuit sizes and
//! an optional deadline are all enforced while running.

mod builtins;
mod circuit;
mod format;
mod methods;
mod ops;
mod value;

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::debug;

pub use value::{CircuitHandle, Dict, GateValue, RangeValue, Value};

use crate::ast::{
    Argument, Comprehension, Expr, FormatPart, LogicalOp, Program, Stmt, StmtKind, Target,
};
use crate::capabilities::Capabilities;
use crate::error::{ErrorKind, ScriptError, ScriptResult};
use value::Function;

/// Steps between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Message of the `TimeoutError` raised when the caller's deadline passes.
pub const DEADLINE_EXCEEDED: &str = "execution deadline exceeded";

/// Resource bounds for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Evaluation steps before `TimeoutError`.
    pub max_steps: u64,
    /// Nested user function calls before `RecursionError`.
    pub max_call_depth: usize,
    /// Largest list, tuple, dict or string a script may build.
    pub max_collection_len: usize,
    /// Elements, counting string characters, a script may allocate over the
    /// whole execution before `MemoryError`.
    pub max_total_elements: usize,
    /// Nested expression and statement evaluations before `RecursionError`.
    pub max_eval_depth: usize,
    /// Largest circuit width a script may allocate.
    pub max_qubits: u32,
    /// Most operations a single circuit may hold.
    pub max_operations: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: 5_000_000,
            max_call_depth: 64,
            max_collection_len: 1_000_000,
            max_total_elements: 10_000_000,
            max_eval_depth: 300,
            max_qubits: 100_000,
            max_operations: 1_000_000,
        }
    }
}

/// Insertion-ordered name bindings.
#[derive(Debug, Default)]
pub struct Scope {
    index: FxHashMap<Rc<str>, usize>,
    slots: Vec<(Rc<str>, Value)>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.slots[i].1)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        match self.index.get(name) {
            Some(&i) => self.slots[i].1 = value,
            None => {
                let key: Rc<str> = Rc::from(name);
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push((key, value));
            }
        }
    }

    /// Bindings in first-assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// What a finished script left behind.
#[derive(Debug)]
pub struct Execution {
    bindings: Scope,
    stdout: String,
    steps: u64,
}

impl Execution {
    /// Top-level bindings in first-assignment order.
    pub fn bindings(&self) -> &Scope {
        &self.bindings
    }

    /// Captured `print` output.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Evaluation steps consumed.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// Runs parsed scripts against a fixed capability set.
#[derive(Debug, Clone)]
pub struct Sandbox {
    capabilities: Arc<Capabilities>,
    limits: ExecutionLimits,
}

impl Sandbox {
    pub fn new(capabilities: Arc<Capabilities>, limits: ExecutionLimits) -> Self {
        Self {
            capabilities,
            limits,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Execute a program in a fresh namespace.
    pub fn execute(&self, program: &Program, deadline: Option<Instant>) -> ScriptResult<Execution> {
        let mut interp = Interpreter::new(&self.capabilities, &self.limits, deadline);
        match interp.exec_block(&program.body)? {
            Flow::Normal => {}
            flow => {
                return Err(ScriptError::internal(format!(
                    "control flow escaped the module: {flow:?}"
                )));
            }
        }
        debug!(
            steps = interp.steps,
            bindings = interp.globals.len(),
            stdout_bytes = interp.stdout.len(),
            "script finished"
        );
        Ok(Execution {
            bindings: interp.globals,
            stdout: interp.stdout,
            steps: interp.steps,
        })
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(Arc::new(Capabilities::standard()), ExecutionLimits::default())
    }
}

/// How a block finished.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Function,
    Comprehension,
}

struct Frame {
    kind: FrameKind,
    scope: Scope,
}

/// Arguments of one call.
pub(crate) struct CallArgs {
    pub(crate) positional: Vec<Value>,
    pub(crate) keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub(crate) fn positional(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    /// Remove and return a keyword argument.
    pub(crate) fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let idx = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(idx).1)
    }

    /// Reject any keyword argument not already taken.
    pub(crate) fn no_more_keywords(&self, function: &str) -> ScriptResult<()> {
        match self.keywords.first() {
            Some((name, _)) => Err(ScriptError::type_error(format!(
                "{function}() got an unexpected keyword argument '{name}'"
            ))),
            None => Ok(()),
        }
    }

    /// Check the positional count is within `min..=max`.
    pub(crate) fn arity(&self, function: &str, min: usize, max: usize) -> ScriptResult<()> {
        let n = self.positional.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("exactly {min}")
            } else if n < min {
                format!("at least {min}")
            } else {
                format!("at most {max}")
            };
            let plural = if min == max && min == 1 { "" } else { "s" };
            return Err(ScriptError::type_error(format!(
                "{function}() takes {expected} argument{plural} ({n} given)"
            )));
        }
        Ok(())
    }
}

/// Lazily iterated sequence.
pub(crate) enum ValueIter {
    Range(RangeValue, usize),
    Items(std::vec::IntoIter<Value>),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Range(range, idx) => {
                let v = range.get(*idx)?;
                *idx += 1;
                Some(Value::Int(v))
            }
            ValueIter::Items(items) => items.next(),
        }
    }
}

pub(crate) struct Interpreter<'a> {
    capabilities: &'a Capabilities,
    pub(crate) limits: &'a ExecutionLimits,
    deadline: Option<Instant>,
    globals: Scope,
    frames: Vec<Frame>,
    steps: u64,
    call_depth: usize,
    eval_depth: usize,
    allocated: usize,
    pub(crate) stdout: String,
    pub(crate) circuits_created: usize,
}

impl<'a> Interpreter<'a> {
    fn new(
        capabilities: &'a Capabilities,
        limits: &'a ExecutionLimits,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            capabilities,
            limits,
            deadline,
            globals: Scope::default(),
            frames: Vec::new(),
            steps: 0,
            call_depth: 0,
            eval_depth: 0,
            allocated: 0,
            stdout: String::new(),
            circuits_created: 0,
        }
    }

    /// Charge one evaluation step.
    pub(crate) fn tick(&mut self) -> ScriptResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::new(
                ErrorKind::TimeoutError,
                format!(
                    "execution exceeded the limit of {} steps",
                    self.limits.max_steps
                ),
            ));
        }
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(ScriptError::new(ErrorKind::TimeoutError, DEADLINE_EXCEEDED));
                }
            }
        }
        Ok(())
    }

    /// Fail with `MemoryError` if a collection would grow past the limit.
    pub(crate) fn check_len(&self, len: usize) -> ScriptResult<()> {
        if len > self.limits.max_collection_len {
            return Err(ScriptError::memory_error(format!(
                "collection of {len} elements exceeds the limit of {}",
                self.limits.max_collection_len
            )));
        }
        Ok(())
    }

    /// Charge `elements` newly allocated elements against the execution's
    /// budget.
    pub(crate) fn charge(&mut self, elements: usize) -> ScriptResult<()> {
        self.allocated = self.allocated.saturating_add(elements);
        if self.allocated > self.limits.max_total_elements {
            return Err(ScriptError::memory_error(format!(
                "script allocated more than {} elements in total",
                self.limits.max_total_elements
            )));
        }
        Ok(())
    }

    fn descend(&mut self) -> ScriptResult<()> {
        if self.eval_depth >= self.limits.max_eval_depth {
            return Err(ScriptError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        self.eval_depth += 1;
        Ok(())
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn lookup(&self, name: &str) -> ScriptResult<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.scope.get(name) {
                return Ok(v.clone());
            }
            if frame.kind == FrameKind::Function {
                break;
            }
        }
        if let Some(v) = self.globals.get(name) {
            return Ok(v.clone());
        }
        self.capabilities
            .lookup(name)
            .map(Value::from)
            .ok_or_else(|| {
                ScriptError::new(
                    ErrorKind::NameError,
                    format!("name '{name}' is not defined"),
                )
            })
    }

    fn bind(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => frame.scope.set(name, value),
            None => self.globals.set(name, value),
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub(crate) fn exec_block(&mut self, body: &[Stmt]) -> ScriptResult<Flow> {
        for stmt in body {
            let flow = self
                .exec_stmt(stmt)
                .map_err(|err| err.at_line(stmt.line))?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> ScriptResult<Flow> {
        self.descend()?;
        let flow = self.run_stmt(stmt);
        self.eval_depth -= 1;
        flow
    }

    fn run_stmt(&mut self, stmt: &Stmt) -> ScriptResult<Flow> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.exec_aug_assign(target, *op, value)?;
            }
            StmtKind::If { test, body, orelse } => {
                let branch = if self.eval(test)?.truthy() {
                    body
                } else {
                    orelse
                };
                return self.exec_block(branch);
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(iter)?;
                for item in self.iter_values(&iterable)? {
                    self.tick()?;
                    self.assign(target, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::While { test, body } => loop {
                self.tick()?;
                if !self.eval(test)?.truthy() {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            },
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::FunctionDef(def) => {
                let defaults = def
                    .params
                    .iter()
                    .map(|p| p.default.as_ref().map(|d| self.eval(d)).transpose())
                    .collect::<ScriptResult<Vec<_>>>()?;
                let function = Function {
                    def: def.clone(),
                    defaults,
                };
                self.bind(&def.name, Value::Function(Rc::new(function)));
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Assert { test, message } => {
                if !self.eval(test)?.truthy() {
                    let message = match message {
                        Some(expr) => self.eval(expr)?.to_str(),
                        None => String::new(),
                    };
                    return Err(ScriptError::new(ErrorKind::AssertionError, message));
                }
            }
            StmtKind::Import { module, alias } => self.exec_import(module, alias.as_deref())?,
            StmtKind::ImportFrom { module, names } => {
                self.exec_import_from(module, names.as_deref())?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_aug_assign(
        &mut self,
        target: &Target,
        op: crate::ast::BinaryOp,
        value: &Expr,
    ) -> ScriptResult<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name)?;
                let rhs = self.eval(value)?;
                let updated = self.in_place(op, current, &rhs)?;
                self.bind(name, updated);
            }
            Target::Subscript { value: obj, index } => {
                let container = self.eval(obj)?;
                let index = self.eval(index)?;
                let current = methods::get_item(&container, &index)?;
                let rhs = self.eval(value)?;
                let updated = self.in_place(op, current, &rhs)?;
                methods::set_item(&container, index, updated)?;
            }
            Target::Attribute { value: obj, name } => {
                let container = self.eval(obj)?;
                return Err(methods::read_only_attribute(&container, name));
            }
            Target::Tuple(_) => {
                return Err(ScriptError::internal(
                    "augmented assignment to a tuple target",
                ));
            }
        }
        Ok(())
    }

    /// `a op= b`: lists extend in place, everything else rebinds.
    fn in_place(
        &mut self,
        op: crate::ast::BinaryOp,
        current: Value,
        rhs: &Value,
    ) -> ScriptResult<Value> {
        if let (crate::ast::BinaryOp::Add, Value::List(list)) = (op, &current) {
            let extra = self.collect_values(rhs)?;
            self.check_len(list.borrow().len() + extra.len())?;
            self.charge(extra.len())?;
            list.borrow_mut().extend(extra);
            return Ok(current);
        }
        let updated = ops::binary(op, &current, rhs, self.limits.max_collection_len)?;
        self.charge(updated.footprint())?;
        Ok(updated)
    }

    fn exec_import(&mut self, path: &str, alias: Option<&str>) -> ScriptResult<()> {
        let module = self.capabilities.module(path).ok_or_else(|| no_module(path))?;
        match alias {
            Some(alias) => self.bind(alias, Value::Module(module)),
            None => {
                let top = path.split('.').next().unwrap_or(path);
                let top_module = self.capabilities.module(top).ok_or_else(|| no_module(top))?;
                self.bind(top, Value::Module(top_module));
            }
        }
        Ok(())
    }

    fn exec_import_from(
        &mut self,
        path: &str,
        names: Option<&[(String, Option<String>)]>,
    ) -> ScriptResult<()> {
        let module = self.capabilities.module(path).ok_or_else(|| no_module(path))?;
        match names {
            None => {
                for (name, global) in module.members() {
                    self.bind(name, Value::from(global));
                }
            }
            Some(names) => {
                for (name, alias) in names {
                    let global = module.attribute(name).ok_or_else(|| {
                        ScriptError::new(
                            ErrorKind::ImportError,
                            format!("cannot import name '{name}' from '{path}'"),
                        )
                    })?;
                    self.bind(alias.as_deref().unwrap_or(name), Value::from(global));
                }
            }
        }
        Ok(())
    }

    fn assign(&mut self, target: &Target, value: Value) -> ScriptResult<()> {
        match target {
            Target::Name(name) => {
                self.bind(name, value);
                Ok(())
            }
            Target::Tuple(targets) => {
                let items = self.collect_values(&value)?;
                if items.len() != targets.len() {
                    let message = if items.len() < targets.len() {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    } else {
                        format!("too many values to unpack (expected {})", targets.len())
                    };
                    return Err(ScriptError::value_error(message));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
            Target::Subscript { value: obj, index } => {
                let container = self.eval(obj)?;
                let index = self.eval(index)?;
                self.charge(1)?;
                methods::set_item(&container, index, value)
            }
            Target::Attribute { value: obj, name } => {
                let container = self.eval(obj)?;
                methods::set_attribute(&container, name, value)
            }
        }
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    pub(crate) fn iter_values(&self, value: &Value) -> ScriptResult<ValueIter> {
        let items = match value {
            Value::Range(r) => return Ok(ValueIter::Range(*r, 0)),
            Value::List(items) => items.borrow().to_vec(),
            Value::Tuple(items) => items.to_vec(),
            Value::Str(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
            Value::Dict(d) => d.borrow().keys().cloned().collect(),
            other => {
                return Err(ScriptError::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )));
            }
        };
        Ok(ValueIter::Items(items.into_iter()))
    }

    /// Materialize an iterable, enforcing the collection limit.
    pub(crate) fn collect_values(&self, value: &Value) -> ScriptResult<Vec<Value>> {
        if let Value::Range(r) = value {
            self.check_len(r.len())?;
        }
        Ok(self.iter_values(value)?.collect())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub(crate) fn eval(&mut self, expr: &Expr) -> ScriptResult<Value> {
        self.descend()?;
        let value = self.eval_expr(expr);
        self.eval_depth -= 1;
        let value = value?;
        if allocates(expr) {
            self.charge(value.footprint())?;
        }
        Ok(value)
    }

    fn eval_expr(&mut self, expr: &Expr) -> ScriptResult<Value> {
        self.tick()?;
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::WideInt(digits) => Err(ScriptError::new(
                ErrorKind::OverflowError,
                format!("integer literal {digits} does not fit in 64 bits"),
            )),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::FormattedStr(parts) => self.eval_formatted(parts),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            Expr::Dict(entries) => {
                let mut dict = Dict::new();
                for (k, v) in entries {
                    let key = self.eval(k)?;
                    let value = self.eval(v)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expr::ListComp { element, clauses } => self.eval_list_comp(element, clauses),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                ops::unary(*op, &v)
            }
            Expr::Binary { left, op, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::binary(*op, &l, &r, self.limits.max_collection_len)
            }
            Expr::Logical { left, op, right } => {
                let l = self.eval(left)?;
                match (op, l.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                    _ => self.eval(right),
                }
            }
            Expr::Compare { left, rest } => {
                let mut l = self.eval(left)?;
                for (op, right) in rest {
                    let r = self.eval(right)?;
                    if !ops::compare(*op, &l, &r)? {
                        return Ok(Value::Bool(false));
                    }
                    l = r;
                }
                Ok(Value::Bool(true))
            }
            Expr::Conditional { test, body, orelse } => {
                if self.eval(test)?.truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Call { func, args } => {
                let callee = self.eval(func)?;
                let args = self.eval_arguments(args)?;
                self.call(&callee, args)
            }
            Expr::Attribute { value, name } => {
                let v = self.eval(value)?;
                methods::get_attribute(&v, name)
            }
            Expr::Subscript { value, index } => {
                let v = self.eval(value)?;
                if let Expr::Slice { lower, upper, step } = index.as_ref() {
                    let lower = self.eval_optional(lower.as_deref())?;
                    let upper = self.eval_optional(upper.as_deref())?;
                    let step = self.eval_optional(step.as_deref())?;
                    return methods::get_slice(&v, lower, upper, step);
                }
                let index = self.eval(index)?;
                methods::get_item(&v, &index)
            }
            Expr::Slice { .. } => Err(ScriptError::type_error(
                "slices are only valid inside subscripts",
            )),
        }
    }

    fn eval_all(&mut self, items: &[Expr]) -> ScriptResult<Vec<Value>> {
        self.check_len(items.len())?;
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn eval_optional(&mut self, expr: Option<&Expr>) -> ScriptResult<Option<Value>> {
        expr.map(|e| self.eval(e)).transpose()
    }

    fn eval_formatted(&mut self, parts: &[FormatPart]) -> ScriptResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                FormatPart::Literal(text) => out.push_str(text),
                FormatPart::Field {
                    expr,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(expr)?;
                    let budget = self.limits.max_collection_len.saturating_sub(out.len());
                    let value = match conversion {
                        Some('r' | 'a') => Value::from(value.checked_repr(budget)?),
                        Some(_) => Value::from(value.checked_str(budget)?),
                        None => value,
                    };
                    match spec {
                        Some(spec) => out.push_str(&format::format_value(&value, spec, budget)?),
                        None => out.push_str(&value.checked_str(budget)?),
                    }
                }
            }
            self.check_len(out.len())?;
        }
        Ok(Value::from(out))
    }

    fn eval_list_comp(&mut self, element: &Expr, clauses: &[Comprehension]) -> ScriptResult<Value> {
        self.frames.push(Frame {
            kind: FrameKind::Comprehension,
            scope: Scope::default(),
        });
        let mut out = Vec::new();
        let result = self.comprehend(element, clauses, &mut out);
        self.frames.pop();
        result?;
        Ok(Value::list(out))
    }

    fn comprehend(
        &mut self,
        element: &Expr,
        clauses: &[Comprehension],
        out: &mut Vec<Value>,
    ) -> ScriptResult<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            self.check_len(out.len() + 1)?;
            let value = self.eval(element)?;
            out.push(value);
            return Ok(());
        };
        let iterable = self.eval(&clause.iter)?;
        for item in self.iter_values(&iterable)? {
            self.tick()?;
            self.assign(&clause.target, item)?;
            let mut keep = true;
            for condition in &clause.conditions {
                if !self.eval(condition)?.truthy() {
                    keep = false;
                    break;
                }
            }
            if keep {
                self.comprehend(element, rest, out)?;
            }
        }
        Ok(())
    }

    fn eval_arguments(&mut self, args: &[Argument]) -> ScriptResult<CallArgs> {
        let mut call = CallArgs::positional(Vec::with_capacity(args.len()));
        for arg in args {
            match arg {
                Argument::Positional(expr) => {
                    let v = self.eval(expr)?;
                    call.positional.push(v);
                }
                Argument::Unpack(expr) => {
                    let v = self.eval(expr)?;
                    let items = self.collect_values(&v)?;
                    call.positional.extend(items);
                    self.check_len(call.positional.len())?;
                }
                Argument::Keyword(name, expr) => {
                    let v = self.eval(expr)?;
                    if call.keywords.iter().any(|(k, _)| k == name) {
                        return Err(ScriptError::type_error(format!(
                            "keyword argument repeated: {name}"
                        )));
                    }
                    call.keywords.push((name.clone(), v));
                }
            }
        }
        Ok(call)
    }

    // =========================================================================
    // Calls
    // =========================================================================

    pub(crate) fn call(&mut self, callee: &Value, args: CallArgs) -> ScriptResult<Value> {
        match callee {
            Value::Builtin(b) => {
                let result = builtins::call(self, *b, args)?;
                self.charge(result.footprint())?;
                Ok(result)
            }
            Value::Function(f) => self.call_function(f, args),
            Value::Method(m) => {
                let result = methods::call_method(self, &m.receiver, m.name, args)?;
                self.charge(result.footprint())?;
                Ok(result)
            }
            Value::Class(class) => circuit::instantiate(self, *class, args),
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(&mut self, function: &Function, mut args: CallArgs) -> ScriptResult<Value> {
        let def = &function.def;
        if self.call_depth >= self.limits.max_call_depth {
            return Err(ScriptError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }

        let params = &def.params;
        if args.positional.len() > params.len() {
            return Err(ScriptError::type_error(format!(
                "{}() takes {} positional argument{} but {} were given",
                def.name,
                params.len(),
                if params.len() == 1 { "" } else { "s" },
                args.positional.len()
            )));
        }

        let mut scope = Scope::default();
        let mut positional = std::mem::take(&mut args.positional).into_iter();
        for (param, default) in params.iter().zip(&function.defaults) {
            let keyword = args.take_keyword(&param.name);
            let value = match (positional.next(), keyword) {
                (Some(_), Some(_)) => {
                    return Err(ScriptError::type_error(format!(
                        "{}() got multiple values for argument '{}'",
                        def.name, param.name
                    )));
                }
                (Some(v), None) | (None, Some(v)) => v,
                (None, None) => default.clone().ok_or_else(|| {
                    ScriptError::type_error(format!(
                        "{}() missing required argument: '{}'",
                        def.name, param.name
                    ))
                })?,
            };
            scope.set(&param.name, value);
        }
        args.no_more_keywords(&def.name)?;

        self.frames.push(Frame {
            kind: FrameKind::Function,
            scope,
        });
        self.call_depth += 1;
        let result = self.exec_block(&def.body);
        self.call_depth -= 1;
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    /// Append captured `print` output, dropping what exceeds the limit.
    pub(crate) fn write_stdout(&mut self, text: &str) {
        let room = self
            .limits
            .max_collection_len
            .saturating_sub(self.stdout.len());
        if text.len() <= room {
            self.stdout.push_str(text);
        } else {
            let mut cut = room;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            self.stdout.push_str(&text[..cut]);
        }
    }
}

/// Expressions whose result is freshly allocated.
fn allocates(expr: &Expr) -> bool {
    match expr {
        Expr::List(_)
        | Expr::Tuple(_)
        | Expr::Dict(_)
        | Expr::ListComp { .. }
        | Expr::FormattedStr(_)
        | Expr::Binary { .. } => true,
        Expr::Subscript { index, .. } => matches!(index.as_ref(), Expr::Slice { .. }),
        _ => false,
    }
}

fn no_module(path: &str) -> ScriptError {
    ScriptError::new(
        ErrorKind::ImportError,
        format!("No module named '{path}'"),
    )
}
