use crate::run_service::RunMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    BuildingProblem,
    Solving,
    Ticking,
    SavingResults,
    Completed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::BuildingProblem => "build",
            RunStage::Solving => "solve",
            RunStage::Ticking => "tick",
            RunStage::SavingResults => "save",
            RunStage::Completed => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub mode: RunMode,
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    /// `(completed, total)` ticks of a real-time run.
    pub ticks: Option<(usize, usize)>,
    pub objective: Option<f64>,
}

impl RunProgressEvent {
    pub fn stage(mode: RunMode, stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            mode,
            stage,
            elapsed_wall_s,
            message,
            ticks: None,
            objective: None,
        }
    }
}
