//! Result data types.

use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub scenario: String,
    pub timestamp: String,
    pub run_type: RunType,
    pub solver_version: String,
    /// Final status of the solve, or of the last tick.
    pub status: String,
}

impl RunManifest {
    /// Manifest stamped with the current UTC time.
    pub fn now(run_id: RunId, scenario: &str, run_type: RunType, solver_version: &str, status: &str) -> Self {
        Self {
            run_id,
            scenario: scenario.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            run_type,
            solver_version: solver_version.to_string(),
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunType {
    Solve,
    RealTime { control_period_s: f64, ticks: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    State,
    Control,
    Intermediate,
}

/// One named quantity over the mesh nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

/// Predicted trajectory published after a solve or a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySnapshot {
    /// Solve or tick time.
    pub time_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    pub status: String,
    pub objective: f64,
    pub node_times: Vec<f64>,
    pub series: Vec<Series>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<NamedValue>,
}

impl TrajectorySnapshot {
    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}
