//! Adaptive ODE stepping with dense output for odesim.
//!
//! Provides:
//! - `VectorField` trait: the contract a dynamical system implements
//! - embedded Runge-Kutta 5(4) methods (Dormand-Prince, Tsitouras)
//! - `Stepper`: one accepted variable-size step at a time, never past a
//!   caller-supplied time bound
//! - `Step`: dense-output descriptor, sampleable at any time in its interval

pub mod error;
pub mod field;
pub mod method;
pub mod step;
pub mod stepper;

// Re-exports for public API
pub use error::{SolverError, SolverResult};
pub use field::VectorField;
pub use method::Method;
pub use step::Step;
pub use stepper::{Stepper, StepperConfig, StepperStats};
