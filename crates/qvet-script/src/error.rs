//! Error types for parsing and sandboxed execution.

use std::fmt;

use thiserror::Error;

/// A rejected submission: the source does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    /// 1-based line of the offending token.
    pub line: usize,
    /// Human-readable description.
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Result type for parsing.
pub type ParseResult<T> = Result<T, SyntaxError>;

/// Category of a runtime failure, named after the exception a script author
/// would expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    TypeError,
    ValueError,
    NameError,
    IndexError,
    KeyError,
    AttributeError,
    ZeroDivisionError,
    ImportError,
    CircuitError,
    RecursionError,
    TimeoutError,
    MemoryError,
    OverflowError,
    AssertionError,
    NotImplementedError,
    /// Interpreter invariant violated; never caused by script content alone.
    InternalError,
}

impl ErrorKind {
    /// Name shown to script authors.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::NameError => "NameError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::KeyError => "KeyError",
            ErrorKind::AttributeError => "AttributeError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::ImportError => "ImportError",
            ErrorKind::CircuitError => "CircuitError",
            ErrorKind::RecursionError => "RecursionError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::MemoryError => "MemoryError",
            ErrorKind::OverflowError => "OverflowError",
            ErrorKind::AssertionError => "AssertionError",
            ErrorKind::NotImplementedError => "NotImplementedError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure raised while executing a script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Line of the statement that raised, when known.
    pub line: Option<usize>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub(crate) fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueError, message)
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexError, message)
    }

    pub(crate) fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AttributeError, message)
    }

    pub(crate) fn circuit_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CircuitError, message)
    }

    pub(crate) fn memory_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MemoryError, message)
    }

    pub(crate) fn overflow() -> Self {
        Self::new(ErrorKind::OverflowError, "integer result out of range")
    }

    pub(crate) fn zero_division(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ZeroDivisionError, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}

impl From<qvet_ir::IrError> for ScriptError {
    fn from(err: qvet_ir::IrError) -> Self {
        ScriptError::circuit_error(err.to_string())
    }
}

/// Result type for sandboxed execution.
pub type ScriptResult<T> = Result<T, ScriptError>;
