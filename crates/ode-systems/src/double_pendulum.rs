//! Double pendulum: two point masses on rigid massless rods.

use nalgebra::{dvector, DVector};
use ode_core::numeric::{degrees, radians};
use ode_core::{CoreError, CoreResult, Params};
use ode_sim::{Eviction, LaunchConfig, Launchable, PlaybackRates};
use ode_solver::{Method, StepperConfig, VectorField};

/// Chaotic double pendulum.
///
/// State is `[theta1, theta2, omega1, omega2]` in radians; both angles are
/// measured from the downward vertical. `theta1` is the upper rod.
#[derive(Clone, Copy, Debug)]
pub struct DoublePendulum {
    m1: f64,
    m2: f64,
    l1: f64,
    l2: f64,
    gravity: f64,
}

fn require_positive(name: &'static str, value: f64) -> CoreResult<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::OutOfRange {
            name: name.into(),
            value,
            what: "must be positive",
        })
    }
}

impl DoublePendulum {
    pub fn new(m1: f64, m2: f64, l1: f64, l2: f64, gravity: f64) -> CoreResult<Self> {
        Ok(Self {
            m1: require_positive("m1", m1)?,
            m2: require_positive("m2", m2)?,
            l1: require_positive("l1", l1)?,
            l2: require_positive("l2", l2)?,
            gravity: require_positive("gravity", gravity)?,
        })
    }

    /// Equal unit masses and rods under standard gravity.
    pub fn symmetric() -> Self {
        Self {
            m1: 1.0,
            m2: 1.0,
            l1: 1.0,
            l2: 1.0,
            gravity: 9.81,
        }
    }

    /// Positions of both bobs, pivot at the origin.
    pub fn cartesian(&self, y: &DVector<f64>) -> ((f64, f64), (f64, f64)) {
        let (t1, t2) = (y[0], y[1]);
        let p1 = (self.l1 * t1.sin(), -self.l1 * t1.cos());
        let p2 = (p1.0 + self.l2 * t2.sin(), p1.1 - self.l2 * t2.cos());
        (p1, p2)
    }

    /// Total mechanical energy; conserved, and the usual accuracy yardstick
    /// for a chaotic system where trajectories cannot be compared pointwise.
    pub fn energy(&self, y: &DVector<f64>) -> f64 {
        let (t1, t2, w1, w2) = (y[0], y[1], y[2], y[3]);
        let v1 = self.l1 * w1;
        let kinetic = 0.5 * self.m1 * v1 * v1
            + 0.5
                * self.m2
                * (v1 * v1
                    + (self.l2 * w2).powi(2)
                    + 2.0 * self.l1 * self.l2 * w1 * w2 * (t1 - t2).cos());
        let potential = -(self.m1 + self.m2) * self.gravity * self.l1 * t1.cos()
            - self.m2 * self.gravity * self.l2 * t2.cos();
        kinetic + potential
    }
}

impl VectorField for DoublePendulum {
    fn dim(&self) -> usize {
        4
    }

    fn derivative(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
        let (t1, t2, w1, w2) = (y[0], y[1], y[2], y[3]);
        let (m1, m2, l1, l2, g) = (self.m1, self.m2, self.l1, self.l2, self.gravity);
        let delta = t1 - t2;
        let den = 2.0 * m1 + m2 - m2 * (2.0 * delta).cos();

        let a1 = (-g * (2.0 * m1 + m2) * t1.sin()
            - m2 * g * (t1 - 2.0 * t2).sin()
            - 2.0 * delta.sin() * m2 * (w2 * w2 * l2 + w1 * w1 * l1 * delta.cos()))
            / (l1 * den);
        let a2 = (2.0
            * delta.sin()
            * (w1 * w1 * l1 * (m1 + m2)
                + g * (m1 + m2) * t1.cos()
                + w2 * w2 * l2 * m2 * delta.cos()))
            / (l2 * den);

        dvector![w1, w2, a1, a2]
    }
}

impl Launchable for DoublePendulum {
    fn name(&self) -> &'static str {
        "double-pendulum"
    }

    /// `theta1` and `theta2` in degrees (required), angular rates `dtheta1`
    /// and `dtheta2` in degrees per second (default 0).
    fn make_state(&self, params: &Params) -> CoreResult<DVector<f64>> {
        let t1 = params.require_finite("theta1")?;
        let t2 = params.require_finite("theta2")?;
        let w1 = params.get_or("dtheta1", 0.0);
        let w2 = params.get_or("dtheta2", 0.0);
        for (name, v) in [("dtheta1", w1), ("dtheta2", w2)] {
            if !v.is_finite() {
                return Err(CoreError::OutOfRange {
                    name: name.into(),
                    value: v,
                    what: "must be finite",
                });
            }
        }
        Ok(dvector![radians(t1), radians(t2), radians(w1), radians(w2)])
    }

    fn named_state(&self, y: &DVector<f64>) -> Option<Params> {
        Some(
            Params::new()
                .with("theta1", degrees(y[0]))
                .with("theta2", degrees(y[1]))
                .with("dtheta1", degrees(y[2]))
                .with("dtheta2", degrees(y[3])),
        )
    }

    /// Chaotic dynamics earn the tighter-coefficient method and a longer
    /// trail by default.
    fn launch_defaults(&self) -> LaunchConfig {
        LaunchConfig {
            rates: PlaybackRates::default(),
            trail: Eviction::Window(1.0),
            stepper: StepperConfig {
                method: Method::Tsit5,
                rtol: 1e-8,
                atol: 1e-10,
                ..StepperConfig::default()
            },
            ..LaunchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_parameters() {
        assert!(DoublePendulum::new(0.0, 1.0, 1.0, 1.0, 9.81).is_err());
        assert!(DoublePendulum::new(1.0, 1.0, 1.0, -2.0, 9.81).is_err());
        assert!(DoublePendulum::new(1.0, 1.0, 1.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn hangs_at_rest_in_equilibrium() {
        let dp = DoublePendulum::symmetric();
        let dy = dp.derivative(0.0, &dvector![0.0, 0.0, 0.0, 0.0]);
        for i in 0..4 {
            assert!(dy[i].abs() < 1e-12, "component {i} = {}", dy[i]);
        }
    }

    #[test]
    fn reduces_to_single_pendulum_when_aligned() {
        // Both rods swinging together at small angle approximate one
        // pendulum of length l1 + l2.
        let dp = DoublePendulum::symmetric();
        let theta = 0.01;
        let dy = dp.derivative(0.0, &dvector![theta, theta, 0.0, 0.0]);
        let expected = -9.81 / 2.0 * theta;
        assert!((dy[2] - expected).abs() < 1e-3, "{} vs {expected}", dy[2]);
        assert!((dy[3] - expected).abs() < 1e-3, "{} vs {expected}", dy[3]);
    }

    #[test]
    fn make_state_marshals_all_four_angles() {
        let dp = DoublePendulum::symmetric();
        let y = dp
            .make_state(
                &Params::new()
                    .with("theta1", 90.0)
                    .with("theta2", -90.0)
                    .with("dtheta1", 10.0),
            )
            .unwrap();
        assert!((y[0] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((y[1] + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((y[2] - 10.0f64.to_radians()).abs() < 1e-12);
        assert_eq!(y[3], 0.0);

        assert!(dp.make_state(&Params::new().with("theta1", 90.0)).is_err());
    }

    #[test]
    fn named_state_round_trips() {
        let dp = DoublePendulum::symmetric();
        let params = Params::new()
            .with("theta1", 120.0)
            .with("theta2", -10.0)
            .with("dtheta1", 5.0)
            .with("dtheta2", -3.0);
        let y = dp.make_state(&params).unwrap();
        let back = dp.named_state(&y).unwrap();
        for (name, v) in params.iter() {
            assert!(
                (back.get(name).unwrap() - v).abs() < 1e-9,
                "{name} did not round-trip"
            );
        }
    }

    #[test]
    fn energy_matches_sum_of_parts_at_rest() {
        let dp = DoublePendulum::symmetric();
        // Hanging at rest: E = -(m1+m2) g l1 - m2 g l2.
        let e = dp.energy(&dvector![0.0, 0.0, 0.0, 0.0]);
        assert!((e - (-2.0 * 9.81 - 9.81)).abs() < 1e-12);
    }
}
