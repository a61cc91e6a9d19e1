//! Injectable tick timers.
//!
//! The scheduler never talks to the wall clock directly; it asks a
//! `TickClock` to wait out each frame interval. `WallClock` paces playback in
//! real time; `ManualClock` returns immediately so headless runs and tests
//! tick back-to-back, deterministically.

use std::time::{Duration, Instant};

/// One logical timer driving session ticks.
pub trait TickClock {
    /// Block until the next frame boundary, `interval` after the previous
    /// one.
    fn wait(&mut self, interval: Duration);

    /// Drop the current frame anchor. Called when playback pauses so that
    /// resuming waits one fresh interval instead of replaying the real time
    /// that passed while paused.
    fn suspend(&mut self) {}
}

/// Real-time pacing against `Instant`.
///
/// Deadlines advance by exactly one interval per frame. If a tick overruns
/// its budget the clock re-anchors at "now" — late frames are delayed, never
/// dropped or doubled.
#[derive(Debug, Default)]
pub struct WallClock {
    deadline: Option<Instant>,
}

impl WallClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickClock for WallClock {
    fn wait(&mut self, interval: Duration) {
        let now = Instant::now();
        match self.deadline {
            None => {
                // First frame (or first after resume) fires immediately.
                self.deadline = Some(now + interval);
            }
            Some(deadline) => {
                if deadline > now {
                    std::thread::sleep(deadline - now);
                    self.deadline = Some(deadline + interval);
                } else {
                    self.deadline = Some(now + interval);
                }
            }
        }
    }

    fn suspend(&mut self) {
        self.deadline = None;
    }
}

/// No waiting at all; counts ticks for test assertions.
#[derive(Debug, Default)]
pub struct ManualClock {
    pub ticks: u64,
    pub suspensions: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickClock for ManualClock {
    fn wait(&mut self, _interval: Duration) {
        self.ticks += 1;
    }

    fn suspend(&mut self) {
        self.suspensions += 1;
    }
}
