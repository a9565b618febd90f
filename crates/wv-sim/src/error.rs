//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered while configuring or driving the string simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid parameter: {what}")]
    InvalidParam { what: &'static str },

    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Changing N from {current} to {requested} requires an explicit resize")]
    ResizeRequired { current: usize, requested: usize },

    #[error("Simulation lock poisoned")]
    Poisoned,

    #[error("Scheduler worker error: {message}")]
    Worker { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<wv_core::CoreError> for SimError {
    fn from(e: wv_core::CoreError) -> Self {
        match e {
            wv_core::CoreError::NonFinite { what, value } => SimError::NonFinite { what, value },
            wv_core::CoreError::InvalidArg { what } => SimError::InvalidParam { what },
            wv_core::CoreError::LengthMismatch {
                what,
                expected,
                actual,
            } => SimError::LengthMismatch {
                what,
                expected,
                actual,
            },
        }
    }
}
