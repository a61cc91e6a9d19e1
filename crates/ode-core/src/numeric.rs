use crate::CoreError;

/// Floating point type used throughout the workspace
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Check every component of a state vector; reports the first offender.
pub fn ensure_all_finite(values: &[Real], what: &'static str) -> Result<(), CoreError> {
    for &v in values {
        if !v.is_finite() {
            return Err(CoreError::NonFinite { what, value: v });
        }
    }
    Ok(())
}

/// Degrees to radians (human-friendly angles live in degrees).
pub fn radians(deg: Real) -> Real {
    deg.to_radians()
}

/// Radians to degrees, for the reverse marshalling direction.
pub fn degrees(rad: Real) -> Real {
    rad.to_degrees()
}
