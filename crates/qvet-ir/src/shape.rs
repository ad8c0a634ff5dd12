//! The circuit shape contract.
//!
//! Structural analysis never looks at a concrete circuit type. It reads any
//! value that can report a qubit count and an ordered sequence of named
//! operations with the qubits they act on. Depth is derived from those two
//! facts alone.

use crate::error::{IrError, IrResult};
use crate::qubit::QubitId;

/// A borrowed view of one operation in a circuit's sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationRef<'a> {
    /// Operation name (`h`, `cx`, `measure`, ...).
    pub name: &'a str,
    /// Qubits the operation acts on.
    pub qubits: &'a [QubitId],
    /// Directives are ordered but occupy no time step.
    pub directive: bool,
}

/// Anything with a qubit count and an ordered operation sequence.
pub trait CircuitShape {
    /// Declared number of qubits.
    fn qubit_count(&self) -> usize;

    /// Operations in sequence order.
    fn operations(&self) -> impl Iterator<Item = OperationRef<'_>>;

    /// Longest chain of operations connected by shared qubits.
    ///
    /// Fails if an operation violates the contract (empty name, or a qubit
    /// index at or beyond [`CircuitShape::qubit_count`]).
    fn layered_depth(&self) -> IrResult<usize> {
        let mut tracker = DepthTracker::new(self.qubit_count());
        for op in self.operations() {
            tracker.push(&op)?;
        }
        Ok(tracker.depth())
    }
}

/// Incremental per-qubit layer bookkeeping.
///
/// Each operation lands one layer above the deepest qubit it touches, and
/// every qubit it touches is raised to that layer.
#[derive(Debug, Clone)]
pub struct DepthTracker {
    levels: Vec<usize>,
    pushed: usize,
}

impl DepthTracker {
    /// Create a tracker for a circuit with `num_qubits` qubits, all at layer 0.
    pub fn new(num_qubits: usize) -> Self {
        Self {
            levels: vec![0; num_qubits],
            pushed: 0,
        }
    }

    /// Record the next operation and return the layer it occupies.
    ///
    /// A directive returns the layer it would synchronise on without
    /// raising any qubit.
    pub fn push(&mut self, op: &OperationRef<'_>) -> IrResult<usize> {
        let index = self.pushed;
        self.pushed += 1;

        if op.name.is_empty() {
            return Err(IrError::UnnamedOperation { index });
        }

        let mut deepest = 0usize;
        for qubit in op.qubits {
            let level = self.levels.get(qubit.index()).copied().ok_or_else(|| {
                IrError::QubitOutOfRange {
                    qubit: *qubit,
                    size: u32::try_from(self.levels.len()).unwrap_or(u32::MAX),
                    gate_name: Some(op.name.to_string()),
                }
            })?;
            deepest = deepest.max(level);
        }

        if op.directive {
            return Ok(deepest);
        }

        let layer = deepest + 1;
        for qubit in op.qubits {
            self.levels[qubit.index()] = layer;
        }
        Ok(layer)
    }

    /// Depth so far: the deepest layer reached by any qubit.
    pub fn depth(&self) -> usize {
        self.levels.iter().copied().max().unwrap_or(0)
    }

    /// Number of operations recorded so far.
    pub fn len(&self) -> usize {
        self.pushed
    }

    /// True if no operation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.pushed == 0
    }
}
