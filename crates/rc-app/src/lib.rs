//! Shared application service layer.
//!
//! Provides the built-in scenarios, configuration loading and the run
//! service used by the CLI: offline solves and closed-loop real-time runs
//! with snapshot publication and run storage.

pub mod config;
pub mod error;
pub mod progress;
pub mod rocket;
pub mod run_service;
pub mod scenario;
pub mod snapshot;
pub mod tank_drive;

pub use config::{AppConfig, load_config};
pub use error::{AppError, AppResult};
pub use progress::{RunProgressEvent, RunStage};
pub use run_service::{
    RunMode, RunRequest, RunResponse, RunTimingSummary, execute, execute_with_progress, list_runs,
    load_run,
};
pub use scenario::Scenario;
pub use snapshot::trajectory_snapshot;
