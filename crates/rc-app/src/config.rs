//! Run configuration files.

use std::fs;
use std::path::Path;

use rc_rti::RtiConfig;
use rc_sqp::SolverConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Solver and real-time settings, loadable from YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub solver: SolverConfig,
    pub rti: RtiConfig,
}

impl AppConfig {
    pub fn validate(&self) -> AppResult<()> {
        self.solver.validate()?;
        self.rti.validate()?;
        Ok(())
    }

    pub fn to_yaml(&self) -> AppResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let content = fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
