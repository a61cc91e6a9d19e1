//! Adaptive stepping: one accepted variable-size step on demand.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::field::VectorField;
use crate::method::{Method, Tableau};
use crate::step::Step;

const STAGES: usize = 7;
/// Step-size growth/shrink clamps, the usual Hairer values.
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const SAFETY: f64 = 0.9;

/// Stepper configuration. Tolerances and method are caller decisions,
/// never hardcoded downstream.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StepperConfig {
    /// Solver variant.
    pub method: Method,
    /// Relative error tolerance.
    pub rtol: f64,
    /// Absolute error tolerance.
    pub atol: f64,
    /// Upper bound on the internal step size (seconds of simulated time).
    pub max_step: f64,
    /// Initial step size; chosen heuristically when absent.
    pub first_step: Option<f64>,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            rtol: 1e-6,
            atol: 1e-9,
            max_step: f64::INFINITY,
            first_step: None,
        }
    }
}

impl StepperConfig {
    fn validate(&self) -> SolverResult<()> {
        if !(self.rtol > 0.0 && self.rtol.is_finite()) {
            return Err(SolverError::InvalidArg {
                what: "rtol must be positive and finite",
            });
        }
        if !(self.atol > 0.0 && self.atol.is_finite()) {
            return Err(SolverError::InvalidArg {
                what: "atol must be positive and finite",
            });
        }
        if !(self.max_step > 0.0) {
            return Err(SolverError::InvalidArg {
                what: "max_step must be positive",
            });
        }
        if let Some(h) = self.first_step {
            if !(h > 0.0 && h.is_finite()) {
                return Err(SolverError::InvalidArg {
                    what: "first_step must be positive and finite",
                });
            }
        }
        Ok(())
    }
}

/// Work counters, in the spirit of solver introspection output.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepperStats {
    /// Vector-field evaluations.
    pub n_eval: u64,
    /// Accepted steps.
    pub n_accepted: u64,
    /// Rejected trial steps.
    pub n_rejected: u64,
}

/// Adaptive embedded Runge-Kutta stepper over a [`VectorField`].
///
/// Owns the current `(t, y)` and the adapted step size. `next_step` advances
/// by exactly one accepted internal step, never past the caller's time bound,
/// and returns a dense-output [`Step`] so callers can sample the interval at
/// their own (typically finer) rate.
#[derive(Debug)]
pub struct Stepper<F: VectorField> {
    system: F,
    cfg: StepperConfig,
    tableau: &'static Tableau,
    t: f64,
    y: DVector<f64>,
    /// FSAL derivative at (t, y), cached across steps. None before the first
    /// evaluation.
    f: Option<DVector<f64>>,
    /// Adapted step size carried between calls.
    h: Option<f64>,
    stats: StepperStats,
}

impl<F: VectorField> Stepper<F> {
    pub fn new(system: F, t0: f64, y0: DVector<f64>, cfg: StepperConfig) -> SolverResult<Self> {
        cfg.validate()?;
        if !t0.is_finite() {
            return Err(SolverError::InvalidArg {
                what: "t0 must be finite",
            });
        }
        if y0.len() != system.dim() {
            return Err(SolverError::InvalidArg {
                what: "initial state length does not match system dimension",
            });
        }
        if y0.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::InvalidArg {
                what: "initial state must be finite",
            });
        }
        Ok(Self {
            system,
            tableau: cfg.method.tableau(),
            cfg,
            t: t0,
            y: y0,
            f: None,
            h: None,
            stats: StepperStats::default(),
        })
    }

    pub fn system(&self) -> &F {
        &self.system
    }

    pub fn config(&self) -> &StepperConfig {
        &self.cfg
    }

    /// Current simulation time.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Current state (the end of the last accepted step).
    pub fn state(&self) -> &DVector<f64> {
        &self.y
    }

    pub fn stats(&self) -> StepperStats {
        self.stats
    }

    fn eval(&mut self, t: f64, y: &DVector<f64>) -> SolverResult<DVector<f64>> {
        self.stats.n_eval += 1;
        let dy = self.system.derivative(t, y);
        debug_assert_eq!(dy.len(), y.len());
        if dy.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite {
                t,
                state: y.clone(),
            });
        }
        Ok(dy)
    }

    /// Crude initial step size from the local derivative scale, bounded so a
    /// bad guess costs at most one rejection.
    fn initial_step(&self, f: &DVector<f64>, max_time: f64) -> f64 {
        let n = self.y.len().max(1) as f64;
        let mut d0 = 0.0;
        let mut d1 = 0.0;
        for i in 0..self.y.len() {
            let scale = self.cfg.atol + self.cfg.rtol * self.y[i].abs();
            d0 += (self.y[i] / scale).powi(2);
            d1 += (f[i] / scale).powi(2);
        }
        d0 = (d0 / n).sqrt();
        d1 = (d1 / n).sqrt();
        let h = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };
        h.min(self.cfg.max_step).min(max_time - self.t).max(1e-12)
    }

    /// Advance by one accepted internal step, not exceeding `max_time`.
    ///
    /// With `t == max_time` this returns a zero-length step without touching
    /// the vector field; the scheduler relies on that at the time horizon.
    pub fn next_step(&mut self, max_time: f64) -> SolverResult<Step> {
        if max_time.is_nan() || max_time == f64::NEG_INFINITY {
            return Err(SolverError::InvalidArg {
                what: "max_time must be a number",
            });
        }
        if max_time < self.t {
            return Err(SolverError::InvalidArg {
                what: "max_time lies before the current time",
            });
        }
        if max_time == self.t {
            return Ok(Step::degenerate(self.t, self.y.clone()));
        }

        // FSAL seed: the derivative at (t, y) survives rejected trials.
        let f0 = match &self.f {
            Some(f) => f.clone(),
            None => {
                let t = self.t;
                let y = self.y.clone();
                let f = self.eval(t, &y)?;
                self.f = Some(f.clone());
                f
            }
        };

        let mut h = match (self.h, self.cfg.first_step) {
            (Some(h), _) => h,
            (None, Some(h0)) => h0.min(self.cfg.max_step),
            (None, None) => self.initial_step(&f0, max_time),
        };

        loop {
            let h_try = h.min(self.cfg.max_step).min(max_time - self.t);
            // The caller's bound may legitimately clip the step to something
            // tiny; underflow only means error control itself demanded it.
            let floor = 10.0 * f64::EPSILON * self.t.abs().max(1.0);
            if h_try < floor {
                return Err(SolverError::StepSizeUnderflow {
                    t: self.t,
                    step: h_try,
                    state: self.y.clone(),
                });
            }

            let tab = self.tableau;
            let mut k: Vec<DVector<f64>> = Vec::with_capacity(STAGES);
            k.push(f0.clone());
            let mut y_new = self.y.clone();
            for s in 1..STAGES {
                let mut y_s = self.y.clone();
                for (j, kj) in k.iter().enumerate() {
                    let a = tab.a[s][j];
                    if a != 0.0 {
                        y_s.axpy(h_try * a, kj, 1.0);
                    }
                }
                if s == STAGES - 1 {
                    // FSAL: the last stage point is the 5th-order solution.
                    y_new = y_s.clone();
                }
                let t_s = self.t + tab.c[s] * h_try;
                k.push(self.eval(t_s, &y_s)?);
            }

            let norm = self.error_norm(&k, &y_new, h_try);
            if norm <= 1.0 {
                self.stats.n_accepted += 1;
                let factor = if norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * norm.powf(-tab.error_exponent)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                self.h = Some((h_try * factor).min(self.cfg.max_step));

                let t_end = if h_try >= max_time - self.t {
                    max_time
                } else {
                    self.t + h_try
                };
                let f_end = k.pop().unwrap_or_else(|| f0.clone());
                let step = Step::new(
                    self.t,
                    t_end,
                    self.y.clone(),
                    y_new.clone(),
                    f0,
                    f_end.clone(),
                );
                self.t = t_end;
                self.y = y_new;
                self.f = Some(f_end);
                return Ok(step);
            }

            self.stats.n_rejected += 1;
            let factor = (SAFETY * norm.powf(-tab.error_exponent)).max(MIN_FACTOR);
            h = h_try * factor;
        }
    }

    /// RMS of component errors scaled by `atol + rtol * |y|`. Non-finite
    /// trial states degrade to an infinite norm so the step is rejected and
    /// retried smaller instead of escaping.
    fn error_norm(&self, k: &[DVector<f64>], y_new: &DVector<f64>, h: f64) -> f64 {
        let tab = self.tableau;
        let n = self.y.len();
        if y_new.iter().any(|v| !v.is_finite()) {
            return f64::INFINITY;
        }
        let mut acc = 0.0;
        for i in 0..n {
            let mut err = 0.0;
            for (j, kj) in k.iter().enumerate() {
                err += tab.e[j] * kj[i];
            }
            err *= h;
            let scale = self.cfg.atol + self.cfg.rtol * self.y[i].abs().max(y_new[i].abs());
            acc += (err / scale).powi(2);
        }
        let norm = (acc / n.max(1) as f64).sqrt();
        if norm.is_finite() {
            norm
        } else {
            f64::INFINITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use std::cell::Cell;

    /// dy/dt = -y, the exponential decay benchmark.
    struct Decay;

    impl VectorField for Decay {
        fn dim(&self) -> usize {
            1
        }

        fn derivative(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
            -y
        }
    }

    /// Counts derivative calls; optionally poisons the output.
    struct Counting {
        calls: Cell<u64>,
        poison: bool,
    }

    impl VectorField for Counting {
        fn dim(&self) -> usize {
            1
        }

        fn derivative(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
            self.calls.set(self.calls.get() + 1);
            if self.poison {
                dvector![f64::NAN]
            } else {
                -y
            }
        }
    }

    #[test]
    fn decay_matches_analytic_solution() {
        let mut stepper =
            Stepper::new(Decay, 0.0, dvector![1.0], StepperConfig::default()).unwrap();
        while stepper.t() < 2.0 {
            stepper.next_step(2.0).unwrap();
        }
        assert_eq!(stepper.t(), 2.0);
        let expected = (-2.0f64).exp();
        assert!(
            (stepper.state()[0] - expected).abs() < 1e-6,
            "got {}, want {}",
            stepper.state()[0],
            expected
        );
    }

    #[test]
    fn steps_never_exceed_bound_and_are_monotone() {
        let mut stepper =
            Stepper::new(Decay, 0.0, dvector![1.0], StepperConfig::default()).unwrap();
        let mut prev_end = 0.0;
        for _ in 0..50 {
            let step = stepper.next_step(1.0).unwrap();
            assert!(step.t_end() >= step.t_start());
            assert!(step.t_start() >= prev_end);
            assert!(step.t_end() <= 1.0);
            prev_end = step.t_end();
            if step.is_zero_length() {
                break;
            }
        }
        assert_eq!(stepper.t(), 1.0);
    }

    #[test]
    fn max_step_is_respected() {
        let cfg = StepperConfig {
            max_step: 0.01,
            ..StepperConfig::default()
        };
        let mut stepper = Stepper::new(Decay, 0.0, dvector![1.0], cfg).unwrap();
        for _ in 0..20 {
            let step = stepper.next_step(10.0).unwrap();
            assert!(step.span() <= 0.01 + 1e-15);
        }
    }

    #[test]
    fn zero_length_request_skips_derivative() {
        let system = Counting {
            calls: Cell::new(0),
            poison: false,
        };
        let mut stepper =
            Stepper::new(system, 1.5, dvector![2.0], StepperConfig::default()).unwrap();
        let step = stepper.next_step(1.5).unwrap();
        assert!(step.is_zero_length());
        assert_eq!(step.t_start(), 1.5);
        assert_eq!(stepper.system().calls.get(), 0);
        assert_eq!(stepper.stats().n_eval, 0);
    }

    #[test]
    fn nan_derivative_reports_time_and_state() {
        let system = Counting {
            calls: Cell::new(0),
            poison: true,
        };
        let mut stepper =
            Stepper::new(system, 0.0, dvector![1.0], StepperConfig::default()).unwrap();
        let err = stepper.next_step(1.0).unwrap_err();
        match err {
            SolverError::NonFinite { t, state } => {
                assert_eq!(t, 0.0);
                assert_eq!(state, dvector![1.0]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_initial_state_dimension_mismatch() {
        let err = Stepper::new(Decay, 0.0, dvector![1.0, 2.0], StepperConfig::default());
        assert!(matches!(err, Err(SolverError::InvalidArg { .. })));
    }

    #[test]
    fn tsit5_also_integrates_decay() {
        let cfg = StepperConfig {
            method: Method::Tsit5,
            ..StepperConfig::default()
        };
        let mut stepper = Stepper::new(Decay, 0.0, dvector![1.0], cfg).unwrap();
        while stepper.t() < 1.0 {
            stepper.next_step(1.0).unwrap();
        }
        assert!((stepper.state()[0] - (-1.0f64).exp()).abs() < 1e-6);
    }
}
