//! Accepted-step descriptor with dense output.

use nalgebra::DVector;

/// One accepted solver step over `[t_start, t_end]`.
///
/// Carries the endpoint states and derivatives, which is enough for cubic
/// Hermite interpolation anywhere inside the interval. The interpolant is
/// exact at both endpoints and fourth-order accurate inside, comfortably
/// below the display sampling error anyone can see.
///
/// A step is consumed by the scheduler while its display clock's next sample
/// time falls inside the interval, then discarded once the solver moves past.
#[derive(Debug, Clone)]
pub struct Step {
    t_start: f64,
    t_end: f64,
    y_start: DVector<f64>,
    y_end: DVector<f64>,
    f_start: DVector<f64>,
    f_end: DVector<f64>,
}

impl Step {
    pub(crate) fn new(
        t_start: f64,
        t_end: f64,
        y_start: DVector<f64>,
        y_end: DVector<f64>,
        f_start: DVector<f64>,
        f_end: DVector<f64>,
    ) -> Self {
        debug_assert!(t_end >= t_start);
        Self {
            t_start,
            t_end,
            y_start,
            y_end,
            f_start,
            f_end,
        }
    }

    /// A zero-length step anchored at `(t, y)`. Sampling returns `y`.
    pub(crate) fn degenerate(t: f64, y: DVector<f64>) -> Self {
        let zero = DVector::zeros(y.len());
        Self {
            t_start: t,
            t_end: t,
            y_start: y.clone(),
            y_end: y,
            f_start: zero.clone(),
            f_end: zero,
        }
    }

    pub fn t_start(&self) -> f64 {
        self.t_start
    }

    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    /// Step length in simulated time.
    pub fn span(&self) -> f64 {
        self.t_end - self.t_start
    }

    pub fn is_zero_length(&self) -> bool {
        self.t_end == self.t_start
    }

    pub fn y_start(&self) -> &DVector<f64> {
        &self.y_start
    }

    pub fn y_end(&self) -> &DVector<f64> {
        &self.y_end
    }

    /// Whether `t` lies inside this step's interval.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.t_start && t <= self.t_end
    }

    /// Dense output: interpolated state at `t`.
    ///
    /// Valid only within `[t_start, t_end]`; arguments outside are clamped to
    /// the interval rather than extrapolated.
    pub fn sample(&self, t: f64) -> DVector<f64> {
        let h = self.span();
        if h == 0.0 {
            return self.y_end.clone();
        }
        let theta = ((t - self.t_start) / h).clamp(0.0, 1.0);

        // Cubic Hermite in Horner-ish form:
        // y(θ) = (1-θ)y0 + θy1 + θ(θ-1)[(1-2θ)(y1-y0) + (θ-1)h f0 + θ h f1]
        let dy = &self.y_end - &self.y_start;
        let mut out = &self.y_start * (1.0 - theta) + &self.y_end * theta;
        let w = theta * (theta - 1.0);
        out.axpy(w * (1.0 - 2.0 * theta), &dy, 1.0);
        out.axpy(w * (theta - 1.0) * h, &self.f_start, 1.0);
        out.axpy(w * theta * h, &self.f_end, 1.0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    /// y(t) = t^2 on [1, 2]: y0=1, y1=4, f0=2, f1=4. A cubic interpolant
    /// reproduces quadratics exactly.
    fn quadratic_step() -> Step {
        Step::new(
            1.0,
            2.0,
            dvector![1.0],
            dvector![4.0],
            dvector![2.0],
            dvector![4.0],
        )
    }

    #[test]
    fn exact_at_endpoints() {
        let step = quadratic_step();
        assert!((step.sample(1.0)[0] - 1.0).abs() < 1e-14);
        assert!((step.sample(2.0)[0] - 4.0).abs() < 1e-14);
    }

    #[test]
    fn reproduces_quadratic_inside() {
        let step = quadratic_step();
        for i in 0..=10 {
            let t = 1.0 + 0.1 * i as f64;
            assert!(
                (step.sample(t)[0] - t * t).abs() < 1e-12,
                "at t = {t}: {} vs {}",
                step.sample(t)[0],
                t * t
            );
        }
    }

    #[test]
    fn clamps_outside_interval() {
        let step = quadratic_step();
        assert!((step.sample(0.0)[0] - 1.0).abs() < 1e-14);
        assert!((step.sample(5.0)[0] - 4.0).abs() < 1e-14);
        assert!(!step.contains(0.0));
        assert!(step.contains(1.5));
    }

    #[test]
    fn degenerate_samples_to_anchor() {
        let step = Step::degenerate(2.5, dvector![1.0, -3.0]);
        assert!(step.is_zero_length());
        assert_eq!(step.sample(2.5), dvector![1.0, -3.0]);
        assert_eq!(step.sample(99.0), dvector![1.0, -3.0]);
    }
}
