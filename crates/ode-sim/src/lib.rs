//! Real-time simulation runtime for ODE systems.
//!
//! Provides:
//! - `TrailCache`: ring-buffered trajectory history for motion trails
//! - `Session`: the scheduler state machine tying wall-clock playback to
//!   simulation time through an adaptive stepper's dense output
//! - `TickClock`: injectable timer (wall clock or deterministic manual)
//! - `Renderer`: the display-adapter boundary, one frame per tick
//! - playback control surface (start/pause/resume/stop)

pub mod clock;
pub mod display;
pub mod error;
pub mod launch;
pub mod playback;
pub mod session;
pub mod trail;

// Re-exports for public API
pub use clock::{ManualClock, TickClock, WallClock};
pub use display::{Frame, NullRenderer, RecordingRenderer, Renderer};
pub use error::{SimError, SimResult};
pub use launch::{LaunchConfig, Launchable, PlaybackRates};
pub use playback::{Command, SessionState};
pub use session::{Session, StopReason, TickOutcome};
pub use trail::{Eviction, TrailCache, TrailEntry, Window};
