//! Transcription of an optimal control problem into a nonlinear program.
//!
//! Supports single shooting (one free initial state, states obtained by
//! chaining interval integrations) and multiple shooting (free state per
//! node, continuity equalities between intervals).

pub mod error;
pub mod eval;
pub mod guess;
pub mod layout;
pub mod transcription;

pub use error::{NlpError, NlpResult};
pub use eval::{LsqResidual, NlpEval, NodeTrajectory};
pub use layout::{Layout, Transcription};
pub use transcription::{Nlp, TranscriptionOptions};
