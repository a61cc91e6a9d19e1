//! Named-parameter marshalling for initial conditions and system parameters.
//!
//! Demo systems accept human-friendly named values (angles in degrees, masses
//! in kilograms) and assemble them into the internal state vector. `Params`
//! is the carrier for those values: an ordered name -> value map with
//! fail-fast lookup and range validation. Conversion is pure and stateless;
//! the reverse direction (state vector back to named values) is implemented
//! per system where a reverse mapping exists.

use crate::error::{CoreError, CoreResult};
use crate::numeric::Real;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ordered collection of named scalar parameters.
///
/// Insertion order is preserved so round-tripped parameter sets print in a
/// stable order. Setting an existing name overwrites in place.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Params {
    entries: Vec<(String, Real)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: Real) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or overwrite a named value.
    pub fn set(&mut self, name: impl Into<String>, value: Real) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Required lookup; absence is an `InvalidParameter`-class failure.
    pub fn get(&self, name: &str) -> CoreResult<Real> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| CoreError::MissingParam {
                name: name.to_string(),
            })
    }

    /// Optional lookup with a default.
    pub fn get_or(&self, name: &str, default: Real) -> Real {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .unwrap_or(default)
    }

    /// Required lookup that must also be finite.
    pub fn require_finite(&self, name: &str) -> CoreResult<Real> {
        let v = self.get(name)?;
        if !v.is_finite() {
            return Err(CoreError::OutOfRange {
                name: name.to_string(),
                value: v,
                what: "must be finite",
            });
        }
        Ok(v)
    }

    /// Required lookup that must be strictly positive (masses, lengths).
    pub fn require_positive(&self, name: &str) -> CoreResult<Real> {
        let v = self.require_finite(name)?;
        if v <= 0.0 {
            return Err(CoreError::OutOfRange {
                name: name.to_string(),
                value: v,
                what: "must be positive",
            });
        }
        Ok(v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Real)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Real)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Real)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}
