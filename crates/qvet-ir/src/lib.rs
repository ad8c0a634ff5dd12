//! qvet Circuit Representation
//!
//! This crate provides the circuit data structures shared by the qvet
//! validation pipeline: the circuit produced by sandboxed execution, the
//! gate vocabulary that execution may use, and the [`CircuitShape`] contract
//! that structural analysis is written against.
//!
//! # Core Components
//!
//! - **Qubits and Classical Bits**: [`QubitId`], [`ClbitId`]
//! - **Gates**: [`StandardGate`] and the [`STANDARD_GATES`] signature table
//! - **Instructions**: [`Instruction`] combining an operation with its operands
//! - **Circuit**: [`Circuit`], an ordered instruction list over fixed registers
//! - **Shape contract**: [`CircuitShape`], qubit count + ordered operations + depth
//!
//! # Example: Building a Bell State
//!
//! ```rust
//! use qvet_ir::{Circuit, CircuitShape, QubitId};
//!
//! let mut circuit = Circuit::with_size("bell_state", 2, 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//! circuit.measure_all().unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.depth(), 3); // H, CX, parallel measures
//! ```
//!
//! # Depth
//!
//! Depth is the length of the longest chain of operations that share a
//! qubit. Operations are processed in sequence order; each one lands one
//! layer above the deepest qubit it touches. Directives (`barrier`) occupy
//! no layer.

pub mod circuit;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod qubit;
pub mod shape;

pub use circuit::Circuit;
pub use error::{IrError, IrResult};
pub use gate::{GateSignature, STANDARD_GATES, StandardGate};
pub use instruction::{Instruction, InstructionKind};
pub use qubit::{ClbitId, QubitId};
pub use shape::{CircuitShape, DepthTracker, OperationRef};
