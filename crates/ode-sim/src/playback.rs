//! Playback state machine and control commands.
//!
//! The transition function is pure so the control surface can be tested
//! without a session: `Idle -> Running <-> Paused -> Stopped`, with `Stopped`
//! terminal. Invalid commands are rejected, never silently ignored.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// User-facing playback command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
        };
        f.write_str(s)
    }
}

impl SessionState {
    /// Apply a playback command, yielding the next state or an
    /// `InvalidTransition` error with the state unchanged.
    pub fn apply(self, command: Command) -> Result<SessionState, SimError> {
        use Command::*;
        use SessionState::*;
        match (self, command) {
            (Idle, Start) => Ok(Running),
            (Running, Pause) => Ok(Paused),
            (Paused, Resume) => Ok(Running),
            (Running, Stop) | (Paused, Stop) => Ok(Stopped),
            (state, command) => Err(SimError::InvalidTransition { state, command }),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Stopped
    }
}
