//! Launch configuration and the contract demo systems satisfy.

use crate::error::{SimError, SimResult};
use crate::trail::Eviction;
use nalgebra::DVector;
use ode_core::{CoreResult, Params};
use ode_solver::{StepperConfig, VectorField};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Display-rate / speed decoupling.
///
/// `srate` fixes how densely the trajectory is sampled in simulated time;
/// `speed` scales how fast simulated time passes against the wall clock.
/// They are independent: slow motion at full sampling density is
/// `speed < 1`, not a lower `srate`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRates {
    /// Display samples per simulated second.
    pub srate: f64,
    /// Simulated seconds per wall-clock second.
    pub speed: f64,
}

impl Default for PlaybackRates {
    fn default() -> Self {
        Self {
            srate: 25.0,
            speed: 1.0,
        }
    }
}

impl PlaybackRates {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.srate > 0.0 && self.srate.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "srate must be positive and finite",
            });
        }
        if !(self.speed > 0.0 && self.speed.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "speed must be positive and finite",
            });
        }
        Ok(())
    }

    /// Simulated seconds covered by one display tick.
    pub fn display_dt(&self) -> f64 {
        1.0 / self.srate
    }

    /// Wall-clock interval between frames.
    pub fn wall_interval(&self) -> Duration {
        Duration::from_secs_f64(self.display_dt() / self.speed)
    }
}

/// Everything needed to launch a playback session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Initial simulation time.
    pub t0: f64,
    /// Time horizon; `None` runs until stopped or the system's termination
    /// predicate fires.
    pub t_end: Option<f64>,
    pub rates: PlaybackRates,
    /// Trail eviction policy ("track" duration in the UI).
    pub trail: Eviction,
    pub stepper: StepperConfig,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            t0: 0.0,
            t_end: None,
            rates: PlaybackRates::default(),
            trail: Eviction::Window(0.5),
            stepper: StepperConfig::default(),
        }
    }
}

/// The stable contract every demo system satisfies on top of its vector
/// field: human-friendly initial conditions in, default launch parameters
/// out.
pub trait Launchable: VectorField {
    /// Short identifier for CLIs and logs.
    fn name(&self) -> &'static str;

    /// Assemble the internal state vector from named parameters (angles in
    /// degrees and the like). Fails fast on missing or out-of-range values.
    fn make_state(&self, params: &Params) -> CoreResult<DVector<f64>>;

    /// Reverse mapping from a state vector to named parameters, where one
    /// exists.
    fn named_state(&self, _y: &DVector<f64>) -> Option<Params> {
        None
    }

    /// Per-system launch defaults (display rate, trail, solver method).
    fn launch_defaults(&self) -> LaunchConfig {
        LaunchConfig::default()
    }
}
