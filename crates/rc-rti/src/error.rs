use rc_nlp::NlpError;
use rc_sqp::SqpError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RtiError {
    #[error("Invalid configuration: {what}")]
    Config { what: &'static str },

    #[error("Measured state has {got} entries, expected {expected}")]
    StateDimension { expected: usize, got: usize },

    #[error("Non-finite input: {what}")]
    NonFinite { what: &'static str },

    #[error("Tick time {time} precedes previous tick at {last}")]
    TimeWentBackwards { time: f64, last: f64 },

    #[error("Driver lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqp(#[from] SqpError),

    #[error(transparent)]
    Nlp(#[from] NlpError),
}

pub type RtiResult<T> = Result<T, RtiError>;
