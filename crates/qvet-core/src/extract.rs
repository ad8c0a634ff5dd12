//! Circuit extraction from a finished execution.

use std::rc::Rc;

use qvet_script::{CircuitHandle, Scope};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// How many circuits a submission may leave behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Exactly one distinct circuit must be bound.
    #[default]
    Strict,
    /// The first circuit binding wins; later ones are ignored.
    FirstMatch,
}

/// Pick the circuit to analyze from the top-level bindings.
///
/// Several names bound to the same circuit object count as one circuit.
pub fn extract_circuit(bindings: &Scope, policy: ExtractionPolicy) -> ValidationResult<CircuitHandle> {
    let mut found: Vec<(&str, &CircuitHandle)> = Vec::new();
    for (name, value) in bindings.iter() {
        let Some(handle) = value.as_circuit() else {
            continue;
        };
        if policy == ExtractionPolicy::FirstMatch {
            return Ok(handle.clone());
        }
        if !found.iter().any(|(_, seen)| Rc::ptr_eq(seen, handle)) {
            found.push((name, handle));
        }
    }

    match found.as_slice() {
        [] => Err(ValidationError::NoCircuitFound),
        [(_, handle)] => Ok(Rc::clone(handle)),
        _ => Err(ValidationError::MultipleCircuitsFound {
            names: found.iter().map(|(name, _)| (*name).to_string()).collect(),
        }),
    }
}
