//! VectorField trait for pluggable dynamical systems.

use nalgebra::{DMatrix, DVector};

/// The contract a dynamical system implements to be simulated.
///
/// `derivative` is the function F in dy/dt = F(t, y). It must be pure in the
/// sense that re-evaluating it at the same (t, y) gives the same answer: the
/// adaptive stepper re-evaluates rejected trial steps, so side effects that
/// depend on call count would corrupt the solution. Non-finite output is
/// detected by the stepper, not here; systems just compute.
pub trait VectorField {
    /// Dimension of the state space. Constant for the lifetime of a run.
    fn dim(&self) -> usize;

    /// Compute the state derivative dy/dt = F(t, y).
    ///
    /// The returned vector must have length `dim()`.
    fn derivative(&self, t: f64, y: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of F with respect to y, if cheap to compute.
    ///
    /// The explicit methods shipped here never call it; it exists for
    /// implicit-method extensions and may stay `None`.
    fn jacobian(&self, _t: f64, _y: &DVector<f64>) -> Option<DMatrix<f64>> {
        None
    }

    /// Termination predicate, checked after each accepted step. When it
    /// returns true the scheduler ends the session.
    fn should_stop(&self, _t: f64, _y: &DVector<f64>) -> bool {
        false
    }
}

impl<F: VectorField + ?Sized> VectorField for &F {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn derivative(&self, t: f64, y: &DVector<f64>) -> DVector<f64> {
        (**self).derivative(t, y)
    }

    fn jacobian(&self, t: f64, y: &DVector<f64>) -> Option<DMatrix<f64>> {
        (**self).jacobian(t, y)
    }

    fn should_stop(&self, t: f64, y: &DVector<f64>) -> bool {
        (**self).should_stop(t, y)
    }
}

impl<F: VectorField + ?Sized> VectorField for Box<F> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn derivative(&self, t: f64, y: &DVector<f64>) -> DVector<f64> {
        (**self).derivative(t, y)
    }

    fn jacobian(&self, t: f64, y: &DVector<f64>) -> Option<DMatrix<f64>> {
        (**self).jacobian(t, y)
    }

    fn should_stop(&self, t: f64, y: &DVector<f64>) -> bool {
        (**self).should_stop(t, y)
    }
}
