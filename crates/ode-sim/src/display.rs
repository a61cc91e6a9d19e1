//! Display adapter boundary.
//!
//! The runtime hands the renderer one `Frame` per tick: current time, a
//! borrow of the current state, and the trail window. The renderer updates
//! its own retained primitives; the core guarantees frames arrive in strictly
//! increasing simulation time and never concurrently.

use crate::trail::Window;
use nalgebra::DVector;

/// One rendered frame's worth of data.
pub struct Frame<'a> {
    /// Simulation time of this frame.
    pub t: f64,
    /// Current state; borrowed, copy if you retain it.
    pub state: &'a DVector<f64>,
    /// Trail window, oldest first. Clone to iterate more than once.
    pub trail: Window<'a>,
}

/// Boundary interface to rendering.
pub trait Renderer {
    fn render(&mut self, frame: Frame<'_>);
}

/// Discards every frame; for benchmarks and duty-cycle tests.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: Frame<'_>) {}
}

/// Records frames for assertions and headless export.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    /// (time, state copy) per frame, in render order.
    pub frames: Vec<(f64, DVector<f64>)>,
    /// Trail window length observed at each frame.
    pub trail_lens: Vec<usize>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn times(&self) -> Vec<f64> {
        self.frames.iter().map(|(t, _)| *t).collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: Frame<'_>) {
        self.frames.push((frame.t, frame.state.clone()));
        self.trail_lens.push(frame.trail.len());
    }
}
