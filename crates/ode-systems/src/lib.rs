//! Demo dynamical systems for the playback runtime.
//!
//! Each system implements the vector-field contract plus the launch surface:
//! named human-friendly initial conditions (angles in degrees) marshalled into
//! the internal state vector, and per-system launch defaults.

pub mod double_pendulum;
pub mod pendulum;

pub use double_pendulum::DoublePendulum;
pub use pendulum::Pendulum;
