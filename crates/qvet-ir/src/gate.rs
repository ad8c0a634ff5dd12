//! Quantum gate types.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};

/// Standard gates with known semantics.
///
/// Rotation angles are concrete values: submitted code is executed before
/// analysis, so every parameter is bound by the time a gate is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    // Single-qubit Pauli gates
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,

    // Single-qubit Clifford gates
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,
    /// sqrt(X) gate.
    SX,
    /// sqrt(X)-dagger gate.
    SXdg,

    // Single-qubit rotation gates
    /// Rotation around X axis.
    Rx(f64),
    /// Rotation around Y axis.
    Ry(f64),
    /// Rotation around Z axis.
    Rz(f64),
    /// Phase gate.
    P(f64),
    /// Universal single-qubit gate U(θ, φ, λ).
    U(f64, f64, f64),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// Controlled-Hadamard gate.
    CH,
    /// SWAP gate.
    Swap,
    /// iSWAP gate.
    ISwap,
    /// Controlled rotation around X.
    CRx(f64),
    /// Controlled rotation around Y.
    CRy(f64),
    /// Controlled rotation around Z.
    CRz(f64),
    /// Controlled phase gate.
    CP(f64),
    /// XX rotation gate.
    RXX(f64),
    /// YY rotation gate.
    RYY(f64),
    /// ZZ rotation gate.
    RZZ(f64),

    // Three-qubit gates
    /// Toffoli gate (CCX).
    CCX,
    /// Fredkin gate (CSWAP).
    CSwap,
}

/// Static description of a standard gate: how scripts name it and what it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSignature {
    /// Instruction name, as used by circuit methods and gate histograms.
    pub name: &'static str,
    /// Name of the gate class exposed to scripts.
    pub class_name: &'static str,
    /// Number of qubits the gate acts on.
    pub num_qubits: u32,
    /// Number of angle parameters.
    pub num_params: usize,
}

const fn sig(
    name: &'static str,
    class_name: &'static str,
    num_qubits: u32,
    num_params: usize,
) -> GateSignature {
    GateSignature {
        name,
        class_name,
        num_qubits,
        num_params,
    }
}

/// Every standard gate, in vocabulary order.
pub const STANDARD_GATES: &[GateSignature] = &[
    sig("id", "IGate", 1, 0),
    sig("x", "XGate", 1, 0),
    sig("y", "YGate", 1, 0),
    sig("z", "ZGate", 1, 0),
    sig("h", "HGate", 1, 0),
    sig("s", "SGate", 1, 0),
    sig("sdg", "SdgGate", 1, 0),
    sig("t", "TGate", 1, 0),
    sig("tdg", "TdgGate", 1, 0),
    sig("sx", "SXGate", 1, 0),
    sig("sxdg", "SXdgGate", 1, 0),
    sig("rx", "RXGate", 1, 1),
    sig("ry", "RYGate", 1, 1),
    sig("rz", "RZGate", 1, 1),
    sig("p", "PhaseGate", 1, 1),
    sig("u", "UGate", 1, 3),
    sig("cx", "CXGate", 2, 0),
    sig("cy", "CYGate", 2, 0),
    sig("cz", "CZGate", 2, 0),
    sig("ch", "CHGate", 2, 0),
    sig("swap", "SwapGate", 2, 0),
    sig("iswap", "iSwapGate", 2, 0),
    sig("crx", "CRXGate", 2, 1),
    sig("cry", "CRYGate", 2, 1),
    sig("crz", "CRZGate", 2, 1),
    sig("cp", "CPhaseGate", 2, 1),
    sig("rxx", "RXXGate", 2, 1),
    sig("ryy", "RYYGate", 2, 1),
    sig("rzz", "RZZGate", 2, 1),
    sig("ccx", "CCXGate", 3, 0),
    sig("cswap", "CSwapGate", 3, 0),
];

impl GateSignature {
    /// Look up a signature by instruction name.
    pub fn by_name(name: &str) -> Option<&'static GateSignature> {
        STANDARD_GATES.iter().find(|s| s.name == name)
    }

    /// Look up a signature by gate class name.
    pub fn by_class_name(class_name: &str) -> Option<&'static GateSignature> {
        STANDARD_GATES.iter().find(|s| s.class_name == class_name)
    }
}

impl StandardGate {
    /// Build a gate from its instruction name and bound parameters.
    pub fn from_params(name: &str, params: &[f64]) -> IrResult<Self> {
        let signature =
            GateSignature::by_name(name).ok_or_else(|| IrError::UnknownGate(name.to_string()))?;
        if params.len() != signature.num_params {
            return Err(IrError::ParameterCountMismatch {
                gate_name: name.to_string(),
                expected: signature.num_params,
                got: params.len(),
            });
        }

        let p = |i: usize| params[i];
        let gate = match name {
            "id" => StandardGate::I,
            "x" => StandardGate::X,
            "y" => StandardGate::Y,
            "z" => StandardGate::Z,
            "h" => StandardGate::H,
            "s" => StandardGate::S,
            "sdg" => StandardGate::Sdg,
            "t" => StandardGate::T,
            "tdg" => StandardGate::Tdg,
            "sx" => StandardGate::SX,
            "sxdg" => StandardGate::SXdg,
            "rx" => StandardGate::Rx(p(0)),
            "ry" => StandardGate::Ry(p(0)),
            "rz" => StandardGate::Rz(p(0)),
            "p" => StandardGate::P(p(0)),
            "u" => StandardGate::U(p(0), p(1), p(2)),
            "cx" => StandardGate::CX,
            "cy" => StandardGate::CY,
            "cz" => StandardGate::CZ,
            "ch" => StandardGate::CH,
            "swap" => StandardGate::Swap,
            "iswap" => StandardGate::ISwap,
            "crx" => StandardGate::CRx(p(0)),
            "cry" => StandardGate::CRy(p(0)),
            "crz" => StandardGate::CRz(p(0)),
            "cp" => StandardGate::CP(p(0)),
            "rxx" => StandardGate::RXX(p(0)),
            "ryy" => StandardGate::RYY(p(0)),
            "rzz" => StandardGate::RZZ(p(0)),
            "ccx" => StandardGate::CCX,
            "cswap" => StandardGate::CSwap,
            other => return Err(IrError::UnknownGate(other.to_string())),
        };
        Ok(gate)
    }

    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::SX => "sx",
            StandardGate::SXdg => "sxdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::U(_, _, _) => "u",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::CH => "ch",
            StandardGate::Swap => "swap",
            StandardGate::ISwap => "iswap",
            StandardGate::CRx(_) => "crx",
            StandardGate::CRy(_) => "cry",
            StandardGate::CRz(_) => "crz",
            StandardGate::CP(_) => "cp",
            StandardGate::RXX(_) => "rxx",
            StandardGate::RYY(_) => "ryy",
            StandardGate::RZZ(_) => "rzz",
            StandardGate::CCX => "ccx",
            StandardGate::CSwap => "cswap",
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::I
            | StandardGate::X
            | StandardGate::Y
            | StandardGate::Z
            | StandardGate::H
            | StandardGate::S
            | StandardGate::Sdg
            | StandardGate::T
            | StandardGate::Tdg
            | StandardGate::SX
            | StandardGate::SXdg
            | StandardGate::Rx(_)
            | StandardGate::Ry(_)
            | StandardGate::Rz(_)
            | StandardGate::P(_)
            | StandardGate::U(_, _, _) => 1,

            StandardGate::CX
            | StandardGate::CY
            | StandardGate::CZ
            | StandardGate::CH
            | StandardGate::Swap
            | StandardGate::ISwap
            | StandardGate::CRx(_)
            | StandardGate::CRy(_)
            | StandardGate::CRz(_)
            | StandardGate::CP(_)
            | StandardGate::RXX(_)
            | StandardGate::RYY(_)
            | StandardGate::RZZ(_) => 2,

            StandardGate::CCX | StandardGate::CSwap => 3,
        }
    }

    /// Get parameters of this gate.
    pub fn parameters(&self) -> Vec<f64> {
        match self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p)
            | StandardGate::CRx(p)
            | StandardGate::CRy(p)
            | StandardGate::CRz(p)
            | StandardGate::CP(p)
            | StandardGate::RXX(p)
            | StandardGate::RYY(p)
            | StandardGate::RZZ(p) => vec![*p],

            StandardGate::U(a, b, c) => vec![*a, *b, *c],

            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_standard_gate_properties() {
        assert_eq!(StandardGate::H.num_qubits(), 1);
        assert_eq!(StandardGate::CX.num_qubits(), 2);
        assert_eq!(StandardGate::CCX.num_qubits(), 3);
        assert_eq!(StandardGate::U(PI, 0.0, PI).parameters().len(), 3);
    }

    #[test]
    fn test_signature_table_agrees_with_gates() {
        for signature in STANDARD_GATES {
            let params = vec![0.5; signature.num_params];
            let gate = StandardGate::from_params(signature.name, &params).unwrap();
            assert_eq!(gate.name(), signature.name);
            assert_eq!(gate.num_qubits(), signature.num_qubits);
            assert_eq!(gate.parameters().len(), signature.num_params);
        }
    }

    #[test]
    fn test_lookup_by_class_name() {
        let signature = GateSignature::by_class_name("CXGate").unwrap();
        assert_eq!(signature.name, "cx");
        assert!(GateSignature::by_class_name("Unitary").is_none());
    }

    #[test]
    fn test_from_params_rejects_bad_arity() {
        let err = StandardGate::from_params("rx", &[]).unwrap_err();
        assert!(matches!(err, IrError::ParameterCountMismatch { expected: 1, got: 0, .. }));

        let err = StandardGate::from_params("foo", &[]).unwrap_err();
        assert_eq!(err, IrError::UnknownGate("foo".into()));
    }
}
