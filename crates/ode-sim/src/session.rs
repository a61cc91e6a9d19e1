//! Playback session: the scheduler state machine.
//!
//! A session owns its stepper, trajectory cache and current state
//! exclusively; the display adapter and playback controller only ever get
//! read-only views or command entry points. Ticks, integration steps, cache
//! pushes and display calls happen in one strict total order.

use std::time::Instant;

use nalgebra::DVector;
use ode_core::numeric::{ensure_all_finite, ensure_finite};
use ode_core::timing::{AccumulatingTimer, Timer};
use ode_core::Params;
use ode_solver::{Step, Stepper, StepperStats, VectorField};

use crate::clock::TickClock;
use crate::display::{Frame, Renderer};
use crate::error::{SimError, SimResult};
use crate::launch::{LaunchConfig, Launchable, PlaybackRates};
use crate::playback::{Command, SessionState};
use crate::trail::TrailCache;

/// Why a session ended up `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StopReason {
    /// Reached the configured time horizon.
    Completed,
    /// The system's termination predicate fired at `t`.
    Predicate { t: f64 },
    /// Explicit stop command.
    Command,
    /// Integration failed; the error was returned from `tick`.
    Failed,
}

/// Result of one display tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// A frame was produced; playback continues.
    Frame { t: f64 },
    /// The session just transitioned to `Stopped`.
    Finished(StopReason),
}

/// One simulation playback session.
///
/// Display frames are produced for strictly increasing simulation time: no
/// frame is re-emitted or skipped backward. Stop is checked once per tick, so
/// stopping never waits on more than one tick's worth of work. After
/// `Stopped`, the trail and last state stay readable for inspection.
#[derive(Debug)]
pub struct Session<F: VectorField> {
    stepper: Stepper<F>,
    /// Accepted-step interval currently being consumed by the display
    /// clock; replaced once the next sample time moves past it.
    current: Option<Step>,
    t: f64,
    y: DVector<f64>,
    trail: TrailCache,
    rates: PlaybackRates,
    t_end: Option<f64>,
    machine: SessionState,
    stop_reason: Option<StopReason>,
    tick_cost: AccumulatingTimer,
}

impl<F: VectorField> Session<F> {
    pub fn new(system: F, config: &LaunchConfig, init: DVector<f64>) -> SimResult<Self> {
        config.rates.validate()?;
        ensure_finite(config.t0, "t0")?;
        ensure_all_finite(init.as_slice(), "initial state")?;
        if let Some(t_end) = config.t_end {
            if !(t_end >= config.t0) {
                return Err(SimError::InvalidArg {
                    what: "t_end must not precede t0",
                });
            }
        }
        let trail = TrailCache::new(config.trail)?;
        let stepper = Stepper::new(system, config.t0, init.clone(), config.stepper)?;
        Ok(Self {
            stepper,
            current: None,
            t: config.t0,
            y: init,
            trail,
            rates: config.rates,
            t_end: config.t_end,
            machine: SessionState::Idle,
            stop_reason: None,
            tick_cost: AccumulatingTimer::new(),
        })
    }

    /// Build a session from a system's own launch defaults and named initial
    /// conditions.
    pub fn launch(system: F, params: &Params) -> SimResult<Self>
    where
        F: Launchable,
    {
        let config = system.launch_defaults();
        let init = system.make_state(params)?;
        Self::new(system, &config, init)
    }

    pub fn system(&self) -> &F {
        self.stepper.system()
    }

    /// Current simulation time (last displayed frame).
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Current state (last displayed frame).
    pub fn state(&self) -> &DVector<f64> {
        &self.y
    }

    pub fn session_state(&self) -> SessionState {
        self.machine
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn trail(&self) -> &TrailCache {
        &self.trail
    }

    pub fn rates(&self) -> PlaybackRates {
        self.rates
    }

    /// Solver work counters for this session.
    pub fn stats(&self) -> StepperStats {
        self.stepper.stats()
    }

    /// Average wall cost of a tick divided by its wall budget. Above one
    /// means the animation lags the real clock.
    pub fn perf_ratio(&self) -> f64 {
        let budget = self.rates.wall_interval().as_secs_f64();
        if budget > 0.0 {
            self.tick_cost.average_seconds() / budget
        } else {
            0.0
        }
    }

    /// Apply a playback command. Invalid transitions are rejected with the
    /// session unchanged.
    pub fn command(&mut self, command: Command) -> SimResult<()> {
        let next = self.machine.apply(command)?;
        tracing::debug!(from = %self.machine, to = %next, %command, "playback transition");
        self.machine = next;
        match command {
            Command::Start => {
                // Prime the trail so the first frame already has a history
                // of one.
                self.trail.push(self.t, &self.y)?;
            }
            Command::Stop => {
                // Any in-flight dense interval is abandoned, not completed.
                self.stop_reason = Some(StopReason::Command);
            }
            Command::Pause | Command::Resume => {}
        }
        Ok(())
    }

    pub fn start(&mut self) -> SimResult<()> {
        self.command(Command::Start)
    }

    /// Pause playback without touching any clock. Drivers pacing against a
    /// real clock should use [`Session::pause_with`] instead.
    pub fn pause(&mut self) -> SimResult<()> {
        self.command(Command::Pause)
    }

    /// Pause playback and drop the clock's frame anchor, so resuming waits
    /// one fresh interval instead of replaying the real time spent paused.
    pub fn pause_with<C: TickClock>(&mut self, clock: &mut C) -> SimResult<()> {
        self.command(Command::Pause)?;
        clock.suspend();
        Ok(())
    }

    pub fn resume(&mut self) -> SimResult<()> {
        self.command(Command::Resume)
    }

    /// Stop immediately. Stopping twice is an `InvalidTransition`, not a
    /// crash; the trail and last state remain readable.
    pub fn stop(&mut self) -> SimResult<()> {
        self.command(Command::Stop)
    }

    fn halt(&mut self, reason: StopReason) {
        self.machine = SessionState::Stopped;
        self.stop_reason = Some(reason);
    }

    /// One display tick: advance the display clock by `1/srate`, integrate
    /// as needed, sample the dense output, push to the trail, render.
    pub fn tick(&mut self, renderer: &mut dyn Renderer) -> SimResult<TickOutcome> {
        if self.machine != SessionState::Running {
            return Err(SimError::NotRunning {
                state: self.machine,
            });
        }
        let started = Instant::now();
        let horizon = self.t_end.unwrap_or(f64::INFINITY);
        if self.t >= horizon {
            self.halt(StopReason::Completed);
            return Ok(TickOutcome::Finished(StopReason::Completed));
        }

        let mut t_target = (self.t + self.rates.display_dt()).min(horizon);

        // Acquire accepted steps until one covers the sample time. A known
        // interval is reused across ticks; the solver is only consulted once
        // the display clock outruns it.
        let mut predicate_at: Option<f64> = None;
        while !self
            .current
            .as_ref()
            .is_some_and(|step| step.contains(t_target))
        {
            let step = match self.stepper.next_step(horizon) {
                Ok(step) => step,
                Err(err) => {
                    tracing::warn!(t = self.t, error = %err, "integration failed; halting");
                    self.halt(StopReason::Failed);
                    return Err(err.into());
                }
            };
            let fired = !step.is_zero_length()
                && self
                    .stepper
                    .system()
                    .should_stop(step.t_end(), step.y_end());
            self.current = Some(step);
            if fired {
                let t_stop = self.current.as_ref().map(Step::t_end).unwrap_or(t_target);
                predicate_at = Some(t_stop);
                t_target = t_target.min(t_stop);
                break;
            }
        }

        // Invariant: frames move strictly forward. `t_target` exceeds the
        // previous frame time except exactly at the horizon, handled above.
        let sampled = self
            .current
            .as_ref()
            .map(|step| step.sample(t_target))
            .unwrap_or_else(|| self.y.clone());
        self.t = t_target;
        self.y = sampled;
        self.trail.push(self.t, &self.y)?;
        renderer.render(Frame {
            t: self.t,
            state: &self.y,
            trail: self.trail.window(),
        });
        self.tick_cost.record(started.elapsed().as_secs_f64());

        if let Some(t) = predicate_at {
            tracing::debug!(t, "termination predicate fired");
            let reason = StopReason::Predicate { t };
            self.halt(reason);
            return Ok(TickOutcome::Finished(reason));
        }
        if self.t >= horizon {
            self.halt(StopReason::Completed);
            return Ok(TickOutcome::Finished(StopReason::Completed));
        }
        Ok(TickOutcome::Frame { t: self.t })
    }

    /// Drive the session to completion: start if idle, then tick at the
    /// clock's pace until stopped. Total wall cost is reported through the
    /// timing gate when enabled.
    pub fn run<R: Renderer, C: TickClock>(
        &mut self,
        renderer: &mut R,
        clock: &mut C,
    ) -> SimResult<StopReason> {
        let timer = Timer::start("session run");
        let result = self.run_loop(renderer, clock);
        timer.stop_and_print();
        result
    }

    fn run_loop<R: Renderer, C: TickClock>(
        &mut self,
        renderer: &mut R,
        clock: &mut C,
    ) -> SimResult<StopReason> {
        if self.machine == SessionState::Idle {
            self.start()?;
        }
        loop {
            match self.machine {
                SessionState::Running => {
                    clock.wait(self.rates.wall_interval());
                    if let TickOutcome::Finished(reason) = self.tick(renderer)? {
                        return Ok(reason);
                    }
                }
                SessionState::Stopped => {
                    return Ok(self.stop_reason.unwrap_or(StopReason::Command));
                }
                SessionState::Idle | SessionState::Paused => {
                    return Err(SimError::NotRunning {
                        state: self.machine,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{NullRenderer, RecordingRenderer};
    use crate::trail::Eviction;
    use nalgebra::dvector;
    use ode_solver::StepperConfig;

    /// dy/dt = 1: simulation time is the state, easy to assert on.
    #[derive(Debug)]
    struct Ramp;

    impl VectorField for Ramp {
        fn dim(&self) -> usize {
            1
        }

        fn derivative(&self, _t: f64, _y: &DVector<f64>) -> DVector<f64> {
            dvector![1.0]
        }
    }

    fn config(t_end: Option<f64>) -> LaunchConfig {
        LaunchConfig {
            t_end,
            trail: Eviction::Capacity(64),
            ..LaunchConfig::default()
        }
    }

    #[test]
    fn frames_strictly_increase_until_horizon() {
        let mut session = Session::new(Ramp, &config(Some(0.2)), dvector![0.0]).unwrap();
        let mut rec = RecordingRenderer::new();
        session.start().unwrap();
        loop {
            match session.tick(&mut rec).unwrap() {
                TickOutcome::Frame { .. } => {}
                TickOutcome::Finished(reason) => {
                    assert_eq!(reason, StopReason::Completed);
                    break;
                }
            }
        }
        let times = rec.times();
        assert!(!times.is_empty());
        assert!(times.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(*times.last().unwrap(), 0.2);
        // dy/dt = 1 from y(0) = 0: displayed state tracks displayed time.
        for (t, y) in &rec.frames {
            assert!((y[0] - t).abs() < 1e-9);
        }
    }

    #[test]
    fn tick_while_idle_or_paused_is_rejected() {
        let mut session = Session::new(Ramp, &config(None), dvector![0.0]).unwrap();
        let mut rec = NullRenderer;
        assert!(matches!(
            session.tick(&mut rec),
            Err(SimError::NotRunning { .. })
        ));
        session.start().unwrap();
        session.pause().unwrap();
        assert!(matches!(
            session.tick(&mut rec),
            Err(SimError::NotRunning { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_launch_input() {
        let err = Session::new(Ramp, &config(None), dvector![f64::NAN]).unwrap_err();
        assert!(matches!(
            err,
            SimError::Core(ode_core::CoreError::NonFinite { .. })
        ));
        let bad_t0 = LaunchConfig {
            t0: f64::INFINITY,
            ..config(None)
        };
        let err = Session::new(Ramp, &bad_t0, dvector![0.0]).unwrap_err();
        assert!(matches!(
            err,
            SimError::Core(ode_core::CoreError::NonFinite { .. })
        ));
    }

    #[test]
    fn pause_with_drops_the_clock_anchor() {
        let mut session = Session::new(Ramp, &config(None), dvector![0.0]).unwrap();
        let mut rec = RecordingRenderer::new();
        let mut clock = crate::clock::ManualClock::new();
        session.start().unwrap();
        session.tick(&mut rec).unwrap();
        let t_paused = session.t();
        session.pause_with(&mut clock).unwrap();
        assert_eq!(clock.suspensions, 1);
        assert_eq!(session.session_state(), SessionState::Paused);
        session.resume().unwrap();
        session.tick(&mut rec).unwrap();
        let dt = session.rates().display_dt();
        assert!((session.t() - (t_paused + dt)).abs() < 1e-12);
    }

    #[test]
    fn pause_resume_does_not_skip_simulated_time() {
        let mut session = Session::new(Ramp, &config(None), dvector![0.0]).unwrap();
        let mut rec = RecordingRenderer::new();
        session.start().unwrap();
        session.tick(&mut rec).unwrap();
        let t_before = session.t();
        session.pause().unwrap();
        // Arbitrary real time passes here; simulated time must not care.
        session.resume().unwrap();
        session.tick(&mut rec).unwrap();
        let dt = session.rates().display_dt();
        assert!((session.t() - (t_before + dt)).abs() < 1e-12);
    }

    #[test]
    fn stop_prevents_further_pushes_and_renders() {
        let mut session = Session::new(Ramp, &config(None), dvector![0.0]).unwrap();
        let mut rec = RecordingRenderer::new();
        session.start().unwrap();
        session.tick(&mut rec).unwrap();
        let frames = rec.frames.len();
        let trail_len = session.trail().len();
        session.stop().unwrap();
        assert!(matches!(
            session.tick(&mut rec),
            Err(SimError::NotRunning { .. })
        ));
        // Second stop is rejected, not a crash.
        assert!(matches!(
            session.stop(),
            Err(SimError::InvalidTransition { .. })
        ));
        assert_eq!(rec.frames.len(), frames);
        assert_eq!(session.trail().len(), trail_len);
        assert_eq!(session.stop_reason(), Some(StopReason::Command));
    }

    #[test]
    fn nan_on_first_derivative_halts_with_t0_context() {
        struct Poison;

        impl VectorField for Poison {
            fn dim(&self) -> usize {
                1
            }

            fn derivative(&self, _t: f64, _y: &DVector<f64>) -> DVector<f64> {
                dvector![f64::NAN]
            }
        }

        let mut session = Session::new(Poison, &config(None), dvector![1.0]).unwrap();
        let mut rec = NullRenderer;
        session.start().unwrap();
        let err = session.tick(&mut rec).unwrap_err();
        match err {
            SimError::Solver(ode_solver::SolverError::NonFinite { t, state }) => {
                assert_eq!(t, 0.0);
                assert_eq!(state, dvector![1.0]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session.session_state(), SessionState::Stopped);
        assert_eq!(session.stop_reason(), Some(StopReason::Failed));
        // Last good state remains inspectable.
        assert_eq!(session.state(), &dvector![1.0]);
    }

    #[test]
    fn termination_predicate_stops_the_session() {
        struct StopAtOne;

        impl VectorField for StopAtOne {
            fn dim(&self) -> usize {
                1
            }

            fn derivative(&self, _t: f64, _y: &DVector<f64>) -> DVector<f64> {
                dvector![1.0]
            }

            fn should_stop(&self, _t: f64, y: &DVector<f64>) -> bool {
                y[0] >= 1.0
            }
        }

        let mut session = Session::new(StopAtOne, &config(None), dvector![0.0]).unwrap();
        let mut rec = RecordingRenderer::new();
        session.start().unwrap();
        let reason = loop {
            match session.tick(&mut rec).unwrap() {
                TickOutcome::Frame { .. } => {}
                TickOutcome::Finished(reason) => break reason,
            }
        };
        match reason {
            StopReason::Predicate { t } => assert!(t >= 1.0 - 1e-6),
            other => panic!("unexpected reason: {other:?}"),
        }
        assert!(session.session_state().is_terminal());
    }

    #[test]
    fn run_with_manual_clock_completes() {
        let mut session = Session::new(
            Ramp,
            &LaunchConfig {
                t_end: Some(1.0),
                stepper: StepperConfig {
                    max_step: 0.1,
                    ..StepperConfig::default()
                },
                trail: Eviction::Window(0.2),
                ..LaunchConfig::default()
            },
            dvector![0.0],
        )
        .unwrap();
        let mut rec = RecordingRenderer::new();
        let mut clock = crate::clock::ManualClock::new();
        let reason = session.run(&mut rec, &mut clock).unwrap();
        assert_eq!(reason, StopReason::Completed);
        assert_eq!(clock.ticks, rec.frames.len() as u64);
        assert!((session.t() - 1.0).abs() < 1e-12);
        // 25 frames per simulated second over one second.
        assert_eq!(rec.frames.len(), 25);
        let stats = session.stats();
        assert!(stats.n_accepted > 0);
        assert!(stats.n_eval > 0);
    }
}
