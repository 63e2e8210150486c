//! Error types for the rc-app service layer.

use std::path::PathBuf;

/// Unified error for the CLI front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Problem construction failed: {0}")]
    Construction(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Real-time loop error: {0}")]
    RealTime(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rc-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<rc_ocp::OcpError> for AppError {
    fn from(err: rc_ocp::OcpError) -> Self {
        AppError::Construction(err.to_string())
    }
}

impl From<rc_model::ModelError> for AppError {
    fn from(err: rc_model::ModelError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<rc_nlp::NlpError> for AppError {
    fn from(err: rc_nlp::NlpError) -> Self {
        AppError::Solver(err.to_string())
    }
}

impl From<rc_sqp::SqpError> for AppError {
    fn from(err: rc_sqp::SqpError) -> Self {
        match err {
            rc_sqp::SqpError::Config { what } => AppError::Config(what.to_string()),
            other => AppError::Solver(other.to_string()),
        }
    }
}

impl From<rc_rti::RtiError> for AppError {
    fn from(err: rc_rti::RtiError) -> Self {
        match err {
            rc_rti::RtiError::Config { what } => AppError::Config(what.to_string()),
            rc_rti::RtiError::Sqp(inner) => inner.into(),
            other => AppError::RealTime(other.to_string()),
        }
    }
}

impl From<rc_results::ResultsError> for AppError {
    fn from(err: rc_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
