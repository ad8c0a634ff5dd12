//! Backend compatibility warnings.
//!
//! The catalog is built once at start-up and read-only afterwards. Checks
//! only ever produce warnings; a circuit that exceeds a backend's limits is
//! still a valid circuit.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::analyze::CircuitAnalysis;

/// Qubit capacity assumed for backends without a profile.
pub const DEFAULT_MAX_QUBITS: usize = 127;

/// Operations that every backend accepts regardless of its basis.
const NON_GATE_OPERATIONS: [&str; 3] = ["measure", "barrier", "reset"];

/// Resource limits of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendProfile {
    /// Number of physical qubits.
    pub max_qubits: usize,
    /// Deepest circuit the backend runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Most operations per circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gates: Option<usize>,
    /// Native gate names. Gates outside this set need transpilation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis_gates: Option<Vec<String>>,
}

impl BackendProfile {
    /// A profile limiting qubit count only.
    pub fn with_qubits(max_qubits: usize) -> Self {
        Self {
            max_qubits,
            max_depth: None,
            max_gates: None,
            basis_gates: None,
        }
    }
}

impl Default for BackendProfile {
    fn default() -> Self {
        Self::with_qubits(DEFAULT_MAX_QUBITS)
    }
}

/// Known backends and the fallback profile for everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendCatalog {
    /// Applied to backend names without a profile.
    #[serde(default)]
    pub default: BackendProfile,
    /// Profiles by backend identifier.
    #[serde(default)]
    pub profiles: FxHashMap<String, BackendProfile>,
}

impl BackendCatalog {
    /// Add or replace a named profile.
    #[must_use]
    pub fn with_profile(mut self, name: impl Into<String>, profile: BackendProfile) -> Self {
        self.profiles.insert(name.into(), profile);
        self
    }

    /// Profile for a backend name, if one is registered.
    pub fn get(&self, name: &str) -> Option<&BackendProfile> {
        self.profiles.get(name)
    }

    /// Warnings for running `analysis` on `backend`.
    ///
    /// No backend means no checks. Unknown names are checked against the
    /// default profile.
    pub fn check(&self, analysis: &CircuitAnalysis, backend: Option<&str>) -> Vec<String> {
        let Some(name) = backend else {
            return Vec::new();
        };
        match self.profiles.get(name) {
            Some(profile) => check_profile(analysis, profile, Target::Named(name)),
            None => check_profile(analysis, &self.default, Target::Default),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Default,
    Named(&'a str),
}

fn check_profile(
    analysis: &CircuitAnalysis,
    profile: &BackendProfile,
    target: Target<'_>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if analysis.qubits > profile.max_qubits {
        warnings.push(match target {
            Target::Default => format!(
                "Circuit requires {} qubits, which exceeds most backend capabilities",
                analysis.qubits
            ),
            Target::Named(name) => format!(
                "Circuit requires {} qubits, which exceeds the {} qubits available on backend '{name}'",
                analysis.qubits, profile.max_qubits
            ),
        });
    }

    if let Some(max_depth) = profile.max_depth.filter(|&max| analysis.depth > max) {
        warnings.push(format!(
            "Circuit depth {} exceeds the maximum depth of {max_depth} {}",
            analysis.depth,
            target.describe()
        ));
    }

    if let Some(max_gates) = profile.max_gates.filter(|&max| analysis.gates > max) {
        warnings.push(format!(
            "Circuit has {} gates, which exceeds the limit of {max_gates} {}",
            analysis.gates,
            target.describe()
        ));
    }

    if let Some(basis) = &profile.basis_gates {
        let foreign: Vec<&str> = analysis
            .gate_types
            .keys()
            .map(String::as_str)
            .filter(|gate| !NON_GATE_OPERATIONS.contains(gate))
            .filter(|gate| !basis.iter().any(|b| b == gate))
            .collect();
        if !foreign.is_empty() {
            warnings.push(format!(
                "Gates {} are not native {} and will require transpilation",
                foreign.join(", "),
                target.describe()
            ));
        }
    }

    warnings
}

impl Target<'_> {
    fn describe(self) -> String {
        match self {
            Target::Default => "for most backends".to_string(),
            Target::Named(name) => format!("on backend '{name}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::GateHistogram;

    fn analysis(qubits: usize, depth: usize, gates: &[(&str, usize)]) -> CircuitAnalysis {
        let gate_types: GateHistogram = gates.iter().map(|&(n, c)| (n.to_string(), c)).collect();
        CircuitAnalysis {
            qubits,
            depth,
            gates: gate_types.values().sum(),
            gate_types,
            estimated_execution_time: 0.0,
        }
    }

    #[test]
    fn test_no_backend_no_warnings() {
        let catalog = BackendCatalog::default();
        assert!(catalog.check(&analysis(500, 1, &[("h", 500)]), None).is_empty());
    }

    #[test]
    fn test_default_threshold() {
        let catalog = BackendCatalog::default();
        assert!(catalog.check(&analysis(127, 1, &[("h", 127)]), Some("anything")).is_empty());

        let warnings = catalog.check(&analysis(128, 1, &[("h", 128)]), Some("anything"));
        assert_eq!(
            warnings,
            vec!["Circuit requires 128 qubits, which exceeds most backend capabilities"]
        );
    }

    #[test]
    fn test_named_profile() {
        let catalog = BackendCatalog::default().with_profile(
            "iqm_garnet",
            BackendProfile {
                max_qubits: 20,
                max_depth: Some(5),
                max_gates: Some(8),
                basis_gates: Some(vec!["prx".into(), "cz".into()]),
            },
        );
        let circuit = analysis(21, 6, &[("h", 4), ("cz", 3), ("cx", 1), ("measure", 1), ("barrier", 1)]);
        let warnings = catalog.check(&circuit, Some("iqm_garnet"));
        assert_eq!(
            warnings,
            vec![
                "Circuit requires 21 qubits, which exceeds the 20 qubits available on backend 'iqm_garnet'",
                "Circuit depth 6 exceeds the maximum depth of 5 on backend 'iqm_garnet'",
                "Circuit has 10 gates, which exceeds the limit of 8 on backend 'iqm_garnet'",
                "Gates cx, h are not native on backend 'iqm_garnet' and will require transpilation",
            ]
        );
    }

    #[test]
    fn test_catalog_from_yaml() {
        let yaml = r"
default:
  max_qubits: 64
profiles:
  ibm_brisbane:
    max_qubits: 127
    basis_gates: [ecr, id, rz, sx, x]
";
        let catalog: BackendCatalog = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(catalog.default.max_qubits, 64);
        let profile = catalog.get("ibm_brisbane").unwrap();
        assert_eq!(profile.max_qubits, 127);
        assert_eq!(profile.max_depth, None);
        assert_eq!(profile.basis_gates.as_ref().map(Vec::len), Some(5));
    }
}
