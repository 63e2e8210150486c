//! Content-based hashing for run IDs.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 over scenario name, serialized configuration and solver version.
pub fn compute_run_id<C: Serialize>(scenario: &str, config: &C, solver_version: &str) -> String {
    let mut hasher = Sha256::new();

    hasher.update(scenario.as_bytes());

    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());

    hasher.update(solver_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunType;

    #[test]
    fn hash_stability() {
        let run_type = RunType::Solve;
        let hash1 = compute_run_id("rocket", &run_type, "v1");
        let hash2 = compute_run_id("rocket", &run_type, "v1");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let solve = RunType::Solve;
        let rti = RunType::RealTime {
            control_period_s: 0.5,
            ticks: 20,
        };
        assert_ne!(
            compute_run_id("rocket", &solve, "v1"),
            compute_run_id("tank_drive", &solve, "v1")
        );
        assert_ne!(
            compute_run_id("rocket", &solve, "v1"),
            compute_run_id("rocket", &rti, "v1")
        );
    }
}
