//! Planar pendulum on a rigid massless rod.

use nalgebra::{dvector, DMatrix, DVector};
use ode_core::numeric::{degrees, radians};
use ode_core::{CoreError, CoreResult, Params};
use ode_sim::{Eviction, LaunchConfig, Launchable};
use ode_solver::VectorField;

/// Pendulum of length `L` under gravity `g`.
///
/// State is `[theta, dtheta]` in radians, with `theta = 0` hanging straight
/// down. Dynamics: `theta'' = -(g / L) sin(theta)`.
#[derive(Clone, Copy, Debug)]
pub struct Pendulum {
    length: f64,
    gravity: f64,
}

impl Pendulum {
    pub fn new(length: f64, gravity: f64) -> CoreResult<Self> {
        if !(length > 0.0 && length.is_finite()) {
            return Err(CoreError::OutOfRange {
                name: "length".into(),
                value: length,
                what: "must be positive",
            });
        }
        if !(gravity > 0.0 && gravity.is_finite()) {
            return Err(CoreError::OutOfRange {
                name: "gravity".into(),
                value: gravity,
                what: "must be positive",
            });
        }
        Ok(Self { length, gravity })
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    fn accel_coeff(&self) -> f64 {
        -self.gravity / self.length
    }

    /// Bob position in the vertical plane, pivot at the origin.
    pub fn cartesian(&self, y: &DVector<f64>) -> (f64, f64) {
        let theta = y[0];
        (self.length * theta.sin(), -self.length * theta.cos())
    }

    /// Total mechanical energy per unit mass; conserved along trajectories.
    pub fn energy(&self, y: &DVector<f64>) -> f64 {
        let (theta, dtheta) = (y[0], y[1]);
        0.5 * (self.length * dtheta).powi(2) - self.gravity * self.length * theta.cos()
    }
}

impl VectorField for Pendulum {
    fn dim(&self) -> usize {
        2
    }

    fn derivative(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
        dvector![y[1], self.accel_coeff() * y[0].sin()]
    }

    fn jacobian(&self, _t: f64, y: &DVector<f64>) -> Option<DMatrix<f64>> {
        Some(DMatrix::from_row_slice(
            2,
            2,
            &[0.0, 1.0, self.accel_coeff() * y[0].cos(), 0.0],
        ))
    }
}

impl Launchable for Pendulum {
    fn name(&self) -> &'static str {
        "pendulum"
    }

    /// `theta` in degrees (required), `dtheta` in degrees per second
    /// (default 0).
    fn make_state(&self, params: &Params) -> CoreResult<DVector<f64>> {
        let theta = params.require_finite("theta")?;
        let dtheta = params.get_or("dtheta", 0.0);
        if !dtheta.is_finite() {
            return Err(CoreError::OutOfRange {
                name: "dtheta".into(),
                value: dtheta,
                what: "must be finite",
            });
        }
        Ok(dvector![radians(theta), radians(dtheta)])
    }

    fn named_state(&self, y: &DVector<f64>) -> Option<Params> {
        Some(
            Params::new()
                .with("theta", degrees(y[0]))
                .with("dtheta", degrees(y[1])),
        )
    }

    fn launch_defaults(&self) -> LaunchConfig {
        LaunchConfig {
            trail: Eviction::Window(0.5),
            ..LaunchConfig::default()
        }
    }
}
