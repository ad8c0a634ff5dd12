//! The allow-list of names a script can reach.
//!
//! A [`Capabilities`] value is built once and shared read-only across
//! executions. Every global name, importable module and module member a script
//! can touch is enumerated here; anything else resolves to `NameError`,
//! `ImportError` or `AttributeError`.

use rustc_hash::FxHashMap;

use qvet_ir::{GateSignature, STANDARD_GATES};

/// Builtin functions. Type constructors double as types for `isinstance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Range,
    Len,
    Int,
    Float,
    Str,
    Bool,
    List,
    Dict,
    Tuple,
    Print,
    Abs,
    Min,
    Max,
    Sum,
    Enumerate,
    Reversed,
    Zip,
    Round,
    Sorted,
    Isinstance,
    Math(MathFn),
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("range", Builtin::Range),
    ("len", Builtin::Len),
    ("int", Builtin::Int),
    ("float", Builtin::Float),
    ("str", Builtin::Str),
    ("bool", Builtin::Bool),
    ("list", Builtin::List),
    ("dict", Builtin::Dict),
    ("tuple", Builtin::Tuple),
    ("print", Builtin::Print),
    ("abs", Builtin::Abs),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("sum", Builtin::Sum),
    ("enumerate", Builtin::Enumerate),
    ("reversed", Builtin::Reversed),
    ("zip", Builtin::Zip),
    ("round", Builtin::Round),
    ("sorted", Builtin::Sorted),
    ("isinstance", Builtin::Isinstance),
];

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Math(f) => f.name(),
            other => BUILTINS
                .iter()
                .find(|(_, b)| *b == other)
                .map_or("builtin", |(name, _)| name),
        }
    }
}

/// Functions of the `math` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFn {
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Exp,
    Log,
    Log2,
    Log10,
    Floor,
    Ceil,
    Fabs,
    Pow,
    Radians,
    Degrees,
}

const MATH_FUNCTIONS: &[(&str, MathFn)] = &[
    ("sqrt", MathFn::Sqrt),
    ("sin", MathFn::Sin),
    ("cos", MathFn::Cos),
    ("tan", MathFn::Tan),
    ("asin", MathFn::Asin),
    ("acos", MathFn::Acos),
    ("atan", MathFn::Atan),
    ("atan2", MathFn::Atan2),
    ("exp", MathFn::Exp),
    ("log", MathFn::Log),
    ("log2", MathFn::Log2),
    ("log10", MathFn::Log10),
    ("floor", MathFn::Floor),
    ("ceil", MathFn::Ceil),
    ("fabs", MathFn::Fabs),
    ("pow", MathFn::Pow),
    ("radians", MathFn::Radians),
    ("degrees", MathFn::Degrees),
];

const MATH_CONSTANTS: &[(&str, f64)] = &[
    ("pi", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("tau", std::f64::consts::TAU),
    ("inf", f64::INFINITY),
];

impl MathFn {
    pub fn name(self) -> &'static str {
        MATH_FUNCTIONS
            .iter()
            .find(|(_, f)| *f == self)
            .map_or("math", |(name, _)| name)
    }
}

/// Callable classes exposed to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    QuantumCircuit,
    Gate(&'static GateSignature),
}

impl Class {
    pub fn name(self) -> &'static str {
        match self {
            Class::QuantumCircuit => "QuantumCircuit",
            Class::Gate(sig) => sig.class_name,
        }
    }
}

/// Modules a script may import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Math,
    Qiskit,
    QiskitCircuit,
    QiskitCircuitLibrary,
}

impl Module {
    /// Dotted import path.
    pub fn path(self) -> &'static str {
        match self {
            Module::Math => "math",
            Module::Qiskit => "qiskit",
            Module::QiskitCircuit => "qiskit.circuit",
            Module::QiskitCircuitLibrary => "qiskit.circuit.library",
        }
    }

    fn from_path(path: &str) -> Option<Self> {
        match path {
            "math" => Some(Module::Math),
            "qiskit" => Some(Module::Qiskit),
            "qiskit.circuit" => Some(Module::QiskitCircuit),
            "qiskit.circuit.library" => Some(Module::QiskitCircuitLibrary),
            _ => None,
        }
    }

    fn is_circuit_library(self) -> bool {
        !matches!(self, Module::Math)
    }

    /// The importable members of this module, in a stable order.
    pub fn members(self) -> Vec<(&'static str, Global)> {
        match self {
            Module::Math => MATH_CONSTANTS
                .iter()
                .map(|(name, v)| (*name, Global::Constant(*v)))
                .chain(
                    MATH_FUNCTIONS
                        .iter()
                        .map(|(name, f)| (*name, Global::Builtin(Builtin::Math(*f)))),
                )
                .collect(),
            Module::Qiskit | Module::QiskitCircuit => {
                vec![("QuantumCircuit", Global::Class(Class::QuantumCircuit))]
            }
            Module::QiskitCircuitLibrary => STANDARD_GATES
                .iter()
                .map(|sig| (sig.class_name, Global::Class(Class::Gate(sig))))
                .collect(),
        }
    }

    /// An importable member by name.
    pub fn member(self, name: &str) -> Option<Global> {
        self.members()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, g)| g)
    }

    /// Attribute access: members plus submodules.
    pub fn attribute(self, name: &str) -> Option<Global> {
        match (self, name) {
            (Module::Qiskit, "circuit") => Some(Global::Module(Module::QiskitCircuit)),
            (Module::QiskitCircuit, "library") => {
                Some(Global::Module(Module::QiskitCircuitLibrary))
            }
            _ => self.member(name),
        }
    }
}

/// Anything a global name can resolve to. `Send + Sync`, unlike runtime
/// values, so the allow-list can be shared across worker threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Global {
    Builtin(Builtin),
    Class(Class),
    Module(Module),
    Constant(f64),
}

/// The process-wide allow-list.
#[derive(Debug, Clone)]
pub struct Capabilities {
    globals: FxHashMap<&'static str, Global>,
    circuit_library: bool,
}

impl Capabilities {
    /// Builtins, `math`, and the circuit library.
    pub fn standard() -> Self {
        Self::build(true)
    }

    /// Builtins and `math` only: scripts cannot construct circuits.
    pub fn without_circuit_library() -> Self {
        Self::build(false)
    }

    fn build(circuit_library: bool) -> Self {
        let mut globals: FxHashMap<&'static str, Global> = BUILTINS
            .iter()
            .map(|(name, b)| (*name, Global::Builtin(*b)))
            .collect();
        globals.insert("math", Global::Module(Module::Math));
        if circuit_library {
            globals.insert("qiskit", Global::Module(Module::Qiskit));
            globals.insert("QuantumCircuit", Global::Class(Class::QuantumCircuit));
            for sig in STANDARD_GATES {
                globals.insert(sig.class_name, Global::Class(Class::Gate(sig)));
            }
        }
        Self {
            globals,
            circuit_library,
        }
    }

    /// Whether circuit construction is available.
    pub fn has_circuit_library(&self) -> bool {
        self.circuit_library
    }

    /// Resolve a predefined global name.
    pub fn lookup(&self, name: &str) -> Option<Global> {
        self.globals.get(name).copied()
    }

    /// Resolve an importable module by dotted path.
    pub fn module(&self, path: &str) -> Option<Module> {
        Module::from_path(path).filter(|m| self.circuit_library || !m.is_circuit_library())
    }

    /// All predefined global names, sorted.
    pub fn global_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.globals.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::standard()
    }
}
