//! Structural analysis over the circuit shape contract.

use qvet_ir::{CircuitShape, DepthTracker};
use serde::{Deserialize, Serialize};

use crate::error::ValidationResult;
use crate::verdict::GateHistogram;

/// Seconds per layer of depth in the execution estimate.
const SECONDS_PER_LAYER: f64 = 0.1;
/// Seconds per operation in the execution estimate.
const SECONDS_PER_GATE: f64 = 0.01;

/// Structural metrics of one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitAnalysis {
    pub qubits: usize,
    pub depth: usize,
    pub gates: usize,
    pub gate_types: GateHistogram,
    pub estimated_execution_time: f64,
}

impl CircuitAnalysis {
    /// Fixed figures reported when no circuit library is available.
    pub fn placeholder() -> Self {
        let gate_types = [("h", 2), ("cx", 5), ("measure", 2)]
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        Self {
            qubits: 2,
            depth: 10,
            gates: 15,
            gate_types,
            estimated_execution_time: 1.5,
        }
    }
}

/// Linear runtime heuristic: `depth * 0.1 + gates * 0.01`.
pub fn estimate_execution_time(depth: usize, gates: usize) -> f64 {
    depth as f64 * SECONDS_PER_LAYER + gates as f64 * SECONDS_PER_GATE
}

/// Measure a circuit in one pass over its operations.
///
/// Fails with `AnalysisFailed` if an operation has no name or touches a
/// qubit at or beyond the declared count.
pub fn analyze<S: CircuitShape>(circuit: &S) -> ValidationResult<CircuitAnalysis> {
    let qubits = circuit.qubit_count();
    let mut tracker = DepthTracker::new(qubits);
    let mut gate_types = GateHistogram::new();

    for op in circuit.operations() {
        tracker.push(&op)?;
        *gate_types.entry(op.name.to_string()).or_insert(0) += 1;
    }

    let depth = tracker.depth();
    let gates = tracker.len();
    Ok(CircuitAnalysis {
        qubits,
        depth,
        gates,
        gate_types,
        estimated_execution_time: estimate_execution_time(depth, gates),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use proptest::prelude::*;
    use qvet_ir::{Circuit, OperationRef, QubitId};

    /// A shape backed by plain vectors, independent of [`Circuit`].
    struct Listing {
        qubits: usize,
        ops: Vec<(&'static str, Vec<QubitId>, bool)>,
    }

    impl CircuitShape for Listing {
        fn qubit_count(&self) -> usize {
            self.qubits
        }

        fn operations(&self) -> impl Iterator<Item = OperationRef<'_>> {
            self.ops.iter().map(|(name, qubits, directive)| OperationRef {
                name,
                qubits,
                directive: *directive,
            })
        }
    }

    #[test]
    fn test_bell() {
        let analysis = analyze(&Circuit::bell().unwrap()).unwrap();
        assert_eq!(analysis.qubits, 2);
        assert_eq!(analysis.gates, 4);
        assert_eq!(analysis.depth, 3);
        assert_eq!(analysis.gate_types["h"], 1);
        assert_eq!(analysis.gate_types["cx"], 1);
        assert_eq!(analysis.gate_types["measure"], 2);
        assert_eq!(analysis.estimated_execution_time, 3.0 * 0.1 + 4.0 * 0.01);
    }

    #[test]
    fn test_barrier_counts_but_adds_no_depth() {
        let listing = Listing {
            qubits: 2,
            ops: vec![
                ("h", vec![QubitId(0)], false),
                ("barrier", vec![QubitId(0), QubitId(1)], true),
                ("x", vec![QubitId(1)], false),
            ],
        };
        let analysis = analyze(&listing).unwrap();
        assert_eq!(analysis.depth, 1);
        assert_eq!(analysis.gates, 3);
        assert_eq!(analysis.gate_types["barrier"], 1);
    }

    #[test]
    fn test_malformed_shape_fails() {
        let listing = Listing {
            qubits: 1,
            ops: vec![("cx", vec![QubitId(0), QubitId(3)], false)],
        };
        let err = analyze(&listing).unwrap_err();
        assert!(matches!(err, ValidationError::AnalysisFailed(_)));
        assert!(err.to_string().starts_with("Circuit analysis failed: "));

        let listing = Listing {
            qubits: 1,
            ops: vec![("", vec![QubitId(0)], false)],
        };
        assert!(matches!(
            analyze(&listing),
            Err(ValidationError::AnalysisFailed(_))
        ));
    }

    #[test]
    fn test_empty_circuit() {
        let analysis = analyze(&Circuit::with_size("empty", 3, 0)).unwrap();
        assert_eq!(analysis.qubits, 3);
        assert_eq!(analysis.depth, 0);
        assert_eq!(analysis.gates, 0);
        assert_eq!(analysis.estimated_execution_time, 0.0);
    }

    #[test]
    fn test_placeholder_figures() {
        let analysis = CircuitAnalysis::placeholder();
        assert_eq!(analysis.depth, 10);
        assert_eq!(analysis.gates, 15);
        assert_eq!(analysis.gate_types.values().sum::<usize>(), 9);
        assert_eq!(analysis.estimated_execution_time, 1.5);
    }

    fn arb_ops(qubits: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
        prop::collection::vec((0..qubits, 0..qubits), 0..60)
    }

    proptest! {
        /// Depth never exceeds the operation count, and a circuit with at
        /// least one gate has depth at least one.
        #[test]
        fn test_depth_bounds(ops in arb_ops(5)) {
            let listing = Listing {
                qubits: 5,
                ops: ops
                    .iter()
                    .map(|&(a, b)| {
                        let qubits = if a == b {
                            vec![QubitId(a as u32)]
                        } else {
                            vec![QubitId(a as u32), QubitId(b as u32)]
                        };
                        (if a == b { "h" } else { "cx" }, qubits, false)
                    })
                    .collect(),
            };
            let analysis = analyze(&listing).unwrap();
            prop_assert!(analysis.depth <= analysis.gates);
            prop_assert_eq!(analysis.gates, ops.len());
            prop_assert_eq!(analysis.depth == 0, ops.is_empty());
            prop_assert_eq!(analysis.gate_types.values().sum::<usize>(), analysis.gates);
            prop_assert_eq!(
                analysis.estimated_execution_time,
                analysis.depth as f64 * 0.1 + analysis.gates as f64 * 0.01
            );
        }
    }
}
