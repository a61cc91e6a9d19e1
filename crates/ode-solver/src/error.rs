//! Error types for solver operations.

use nalgebra::DVector;
use thiserror::Error;

/// Errors that can occur while advancing an ODE solution.
///
/// Both failure modes carry the last valid time and state so callers can
/// report exactly where integration broke down.
#[derive(Error, Debug, Clone)]
pub enum SolverError {
    /// The vector field produced NaN or infinity. `state` is the last valid
    /// state, i.e. the point the derivative was evaluated at.
    #[error("Non-finite derivative at t = {t}")]
    NonFinite { t: f64, state: DVector<f64> },

    /// Error control forced the step below the representable floor; the
    /// solver cannot meet its tolerances from this state.
    #[error("Step size underflow at t = {t} (step = {step:.3e})")]
    StepSizeUnderflow {
        t: f64,
        step: f64,
        state: DVector<f64>,
    },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    /// Last valid simulation time, where available.
    pub fn time(&self) -> Option<f64> {
        match self {
            SolverError::NonFinite { t, .. } => Some(*t),
            SolverError::StepSizeUnderflow { t, .. } => Some(*t),
            SolverError::InvalidArg { .. } => None,
        }
    }

    /// Last valid state, where available.
    pub fn state(&self) -> Option<&DVector<f64>> {
        match self {
            SolverError::NonFinite { state, .. } => Some(state),
            SolverError::StepSizeUnderflow { state, .. } => Some(state),
            SolverError::InvalidArg { .. } => None,
        }
    }
}
