//! Built-in problems.

use std::fmt;
use std::str::FromStr;

use nalgebra::DVector;
use rc_ocp::Ocp;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::rocket;
use crate::tank_drive::{self, TankDriveParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Minimum-time rocket, offline only.
    Rocket,
    /// Tank-drive point stabilization, offline or closed loop.
    TankDrive,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::Rocket, Scenario::TankDrive];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Rocket => "rocket",
            Scenario::TankDrive => "tank-drive",
        }
    }

    pub fn build_ocp(self) -> AppResult<Ocp> {
        match self {
            Scenario::Rocket => rocket::build(20),
            Scenario::TankDrive => tank_drive::build(&TankDriveParams::default()),
        }
    }

    pub fn default_config(self) -> AppConfig {
        match self {
            Scenario::Rocket => AppConfig {
                solver: rocket::solver_config(),
                ..AppConfig::default()
            },
            Scenario::TankDrive => {
                let params = TankDriveParams::default();
                AppConfig {
                    solver: tank_drive::solver_config(),
                    rti: tank_drive::rti_config(&params),
                }
            }
        }
    }

    /// Plant state at the first tick of a closed-loop run.
    pub fn plant_initial_state(self) -> Option<DVector<f64>> {
        match self {
            Scenario::Rocket => None,
            Scenario::TankDrive => Some(TankDriveParams::default().initial_state()),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == s || sc.name().replace('-', "_") == s)
            .ok_or_else(|| AppError::UnknownScenario(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for sc in Scenario::ALL {
            assert_eq!(sc.name().parse::<Scenario>().unwrap(), sc);
        }
        assert_eq!("tank_drive".parse::<Scenario>().unwrap(), Scenario::TankDrive);
        assert!("glider".parse::<Scenario>().is_err());
    }

    #[test]
    fn only_tank_drive_runs_closed_loop() {
        assert!(Scenario::Rocket.plant_initial_state().is_none());
        assert_eq!(Scenario::TankDrive.plant_initial_state().map(|x| x.len()), Some(5));
    }

    #[test]
    fn default_configs_are_valid() {
        for sc in Scenario::ALL {
            assert!(sc.default_config().validate().is_ok());
        }
    }
}
