//! ode-core: stable foundation for odesim.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - params (named-parameter marshalling for initial conditions)
//! - timing (coarse perf accounting for the scheduler)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod params;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use params::Params;
