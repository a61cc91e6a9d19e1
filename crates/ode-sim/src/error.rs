//! Error types for the simulation runtime.

use crate::playback::{Command, SessionState};
use ode_core::CoreError;
use ode_solver::SolverError;
use thiserror::Error;

/// Errors surfaced by sessions and the playback control surface.
#[derive(Error, Debug)]
pub enum SimError {
    /// Illegal playback command for the current state; the session is left
    /// unchanged.
    #[error("Invalid playback transition: {command} while {state}")]
    InvalidTransition {
        state: SessionState,
        command: Command,
    },

    /// Ticking a session that is not running.
    #[error("Session is not running (state: {state})")]
    NotRunning { state: SessionState },

    /// Trajectory-cache pushes must be in time order.
    #[error("Out-of-order trail push: t = {t} after latest = {latest}")]
    OutOfOrder { t: f64, latest: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Integration failed; playback halts with the last valid trajectory
    /// still inspectable.
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SimResult<T> = Result<T, SimError>;
