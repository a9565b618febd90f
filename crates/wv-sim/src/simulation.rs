//! One string plus the forces acting on it, advanced tick by tick.

use tracing::{debug, info, trace};
use wv_core::Real;
use wv_core::timing::{RunStats, Timer};

use crate::engine::{ConfigureOutcome, StepReport, WaveState};
use crate::error::SimResult;
use crate::force::{Force, ForceId, ForceRegistry, ForceUpdate};
use crate::params::{ParamUpdate, WaveParams};

/// Receives the new displacement and the engine after every step.
///
/// The slice aliases engine state and is only valid for the call.
pub type StepCallback = Box<dyn FnMut(&[Real], &WaveState) + Send>;

/// Receives the displacement about to be superseded, before each step.
pub type PreStepHook = Box<dyn FnMut(&[Real], &WaveState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
}

/// Why the loop last left [`RunStatus::Running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// Energy decayed below `minLogEnergy` and the string was zeroed.
    Quiescent,
    /// A tick returned an error.
    Failed,
}

/// Everything one tick did.
#[derive(Debug)]
pub struct TickReport {
    pub step: StepReport,
    pub forces: ForceUpdate,
}

pub struct Simulation {
    engine: WaveState,
    forces: ForceRegistry,
    on_step: StepCallback,
    pre_step: Option<PreStepHook>,
    status: RunStatus,
    stop_reason: Option<StopReason>,
    stats: RunStats,
}

impl Simulation {
    pub fn new(params: WaveParams) -> SimResult<Self> {
        Ok(Self::from_engine(WaveState::new(params)?))
    }

    pub fn from_engine(engine: WaveState) -> Self {
        let forces = ForceRegistry::new(engine.n());
        Self {
            engine,
            forces,
            on_step: default_sink(),
            pre_step: None,
            status: RunStatus::Idle,
            stop_reason: None,
            stats: RunStats::default(),
        }
    }

    pub fn engine(&self) -> &WaveState {
        &self.engine
    }

    pub fn forces(&self) -> &ForceRegistry {
        &self.forces
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn set_callback(&mut self, callback: StepCallback) {
        self.on_step = callback;
    }

    pub fn set_pre_step_hook(&mut self, hook: Option<PreStepHook>) {
        self.pre_step = hook;
    }

    /// See [`ForceRegistry::apply_force`]. Does not start anything by
    /// itself; [`Scheduler`](crate::Scheduler) does that.
    pub fn apply_force(&mut self, id: impl Into<ForceId>, force: Option<Force>) -> SimResult<bool> {
        self.forces.apply_force(id, force)
    }

    pub fn is_force_applied(&self, id: &str) -> bool {
        self.forces.is_force_applied(id)
    }

    pub fn recalculate_net_force(&mut self) {
        self.forces.recalculate_net_force();
    }

    pub fn configure(&mut self, update: &ParamUpdate) -> SimResult<ConfigureOutcome> {
        self.engine.configure(update)
    }

    pub fn initialize(&mut self, fx0: &[Real], gx0: &[Real]) -> SimResult<()> {
        self.engine.initialize(fx0, gx0)
    }

    pub fn stationary(&mut self) {
        self.engine.stationary();
    }

    /// Change the point count. Buffers get the default initial conditions
    /// and every registered force is dropped.
    pub fn resize(&mut self, n: usize) -> SimResult<()> {
        self.engine.resize(n)?;
        self.forces.resize(n);
        debug!(n, "string resized");
        Ok(())
    }

    /// Pre-step hook, force update, step, delivery.
    pub fn tick(&mut self) -> SimResult<TickReport> {
        if let Some(hook) = self.pre_step.as_mut() {
            hook(self.engine.state(), &self.engine);
        }

        let timer = Timer::start();
        let forces = self.forces.update_forces();
        timer.stop_into(&self.stats.force_update);

        let timer = Timer::start();
        let step = self.engine.step(self.forces.net_force())?;
        timer.stop_into(&self.stats.step);

        let timer = Timer::start();
        (self.on_step)(self.engine.state(), &self.engine);
        timer.stop_into(&self.stats.delivery);

        self.stats.ticks += 1;
        if step.quiescent {
            info!(step = step.step, energy = step.energy, "string at rest");
            self.status = RunStatus::Idle;
            self.stop_reason = Some(StopReason::Quiescent);
        }
        Ok(TickReport { step, forces })
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = RunStatus::Running;
        self.stop_reason = None;
    }

    pub(crate) fn mark_stopped(&mut self, reason: StopReason) {
        self.status = RunStatus::Idle;
        self.stop_reason = Some(reason);
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("engine", &self.engine)
            .field("forces", &self.forces)
            .field("status", &self.status)
            .field("stop_reason", &self.stop_reason)
            .finish_non_exhaustive()
    }
}

fn default_sink() -> StepCallback {
    Box::new(|state: &[Real], engine: &WaveState| {
        trace!(
            step = engine.steps(),
            points = state.len(),
            energy = engine.energy(),
            "step delivered"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn zero_sim(n: usize) -> Simulation {
        let params = WaveParams {
            n,
            min_log_energy: -300.0,
            ..WaveParams::default()
        };
        let engine =
            WaveState::with_initial_conditions(params, &vec![0.0; n], &vec![0.0; n]).unwrap();
        Simulation::from_engine(engine)
    }

    #[test]
    fn tick_runs_hook_then_step_then_callback() {
        let mut sim = zero_sim(6);
        let log = Arc::new(Mutex::new(Vec::new()));

        let hook_log = Arc::clone(&log);
        sim.set_pre_step_hook(Some(Box::new(move |_: &[Real], engine: &WaveState| {
            hook_log.lock().unwrap().push(("hook", engine.steps()));
        })));
        let cb_log = Arc::clone(&log);
        sim.set_callback(Box::new(move |_: &[Real], engine: &WaveState| {
            cb_log.lock().unwrap().push(("callback", engine.steps()));
        }));

        sim.tick().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![("hook", 0), ("callback", 1)]
        );
        assert_eq!(sim.stats().ticks, 1);
    }

    #[test]
    fn callback_sees_new_state() {
        let mut sim = zero_sim(6);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sim.set_callback(Box::new(move |state: &[Real], _: &WaveState| {
            *sink.lock().unwrap() = state.to_vec();
        }));
        sim.apply_force("push", Some(Force::Uniform(1.0))).unwrap();
        sim.tick().unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), sim.engine().state());
        assert!(sim.engine().state()[2] > 0.0);
    }

    #[test]
    fn quiescence_marks_idle() {
        let params = WaveParams {
            n: 10,
            min_log_energy: -3.0,
            ..WaveParams::default()
        };
        let engine =
            WaveState::with_initial_conditions(params, &vec![0.0; 10], &vec![0.0; 10]).unwrap();
        let mut sim = Simulation::from_engine(engine);
        sim.mark_running();
        let report = sim.tick().unwrap();
        assert!(report.step.quiescent);
        assert_eq!(sim.status(), RunStatus::Idle);
        assert_eq!(sim.stop_reason(), Some(StopReason::Quiescent));
    }

    #[test]
    fn stationary_resets_moving_string() {
        let mut sim = zero_sim(12);
        sim.apply_force("push", Some(Force::Uniform(1.0))).unwrap();
        for _ in 0..5 {
            sim.tick().unwrap();
        }
        assert!(sim.engine().energy() > 0.0);
        assert!(sim.engine().state().iter().any(|&v| v != 0.0));

        sim.stationary();
        assert!(sim.engine().state().iter().all(|&v| v == 0.0));
        assert!(sim.engine().prev_state().iter().all(|&v| v == 0.0));
        assert_eq!(sim.engine().energy(), 0.0);
        assert_eq!(sim.engine().mechanical_energy(), 0.0);
    }

    #[test]
    fn resize_resets_forces() {
        let mut sim = zero_sim(6);
        sim.apply_force("push", Some(Force::Uniform(1.0))).unwrap();
        sim.resize(9).unwrap();
        assert_eq!(sim.engine().n(), 9);
        assert_eq!(sim.forces().n(), 9);
        assert!(!sim.is_force_applied("push"));
        sim.tick().unwrap();
    }
}
