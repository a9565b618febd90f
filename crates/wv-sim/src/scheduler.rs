//! Fixed-cadence driver for a [`Simulation`].
//!
//! A single worker thread ticks the simulation every `dt / speed_up`
//! seconds. The simulation sits behind one mutex, so force updates from
//! other threads always land between two complete ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::engine::ConfigureOutcome;
use crate::error::{SimError, SimResult};
use crate::force::{Force, ForceId};
use crate::params::ParamUpdate;
use crate::simulation::{RunStatus, Simulation, StepCallback, StopReason};

pub type SharedSimulation = Arc<Mutex<Simulation>>;

/// What [`Scheduler::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTransition {
    Started,
    /// Was already running; stopped and started again.
    Restarted,
}

/// What [`Scheduler::stop`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTransition {
    Stopped,
    AlreadyIdle,
}

struct Worker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Idle -> Running -> Idle state machine around a shared [`Simulation`].
pub struct Scheduler {
    sim: SharedSimulation,
    worker: Option<Worker>,
}

impl Scheduler {
    pub fn new(sim: Simulation) -> Self {
        Self {
            sim: Arc::new(Mutex::new(sim)),
            worker: None,
        }
    }

    /// Handle to the simulation for readers on other threads.
    pub fn shared(&self) -> SharedSimulation {
        Arc::clone(&self.sim)
    }

    fn lock(&self) -> SimResult<MutexGuard<'_, Simulation>> {
        self.sim.lock().map_err(|_| SimError::Poisoned)
    }

    /// Run `f` between ticks.
    pub fn with_simulation<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> SimResult<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }

    pub fn status(&self) -> SimResult<RunStatus> {
        Ok(self.lock()?.status())
    }

    pub fn stop_reason(&self) -> SimResult<Option<StopReason>> {
        Ok(self.lock()?.stop_reason())
    }

    pub fn is_force_applied(&self, id: &str) -> SimResult<bool> {
        Ok(self.lock()?.is_force_applied(id))
    }

    /// Start ticking, replacing the step callback if one is given.
    ///
    /// The first tick happens immediately. Calling this while running
    /// restarts the loop with the current cadence.
    pub fn run(&mut self, callback: Option<StepCallback>) -> SimResult<RunTransition> {
        let was_running = self.status()? == RunStatus::Running;
        self.halt_worker();

        let interval = {
            let mut sim = self.lock()?;
            if let Some(callback) = callback {
                sim.set_callback(callback);
            }
            sim.mark_running();
            sim.engine().tick_interval()
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let spawned = {
            let sim = Arc::clone(&self.sim);
            let cancel = Arc::clone(&cancel);
            thread::Builder::new()
                .name("wv-scheduler".to_string())
                .spawn(move || worker_loop(&sim, &cancel, interval))
        };
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.lock()?.mark_stopped(StopReason::Failed);
                return Err(SimError::Worker {
                    message: e.to_string(),
                });
            }
        };
        self.worker = Some(Worker { cancel, handle });

        if was_running {
            debug!(?interval, "scheduler restarted");
            Ok(RunTransition::Restarted)
        } else {
            info!(?interval, "scheduler started");
            Ok(RunTransition::Started)
        }
    }

    /// Stop ticking. Safe to call when already idle.
    pub fn stop(&mut self) -> SimResult<StopTransition> {
        self.halt_worker();
        let mut sim = self.lock()?;
        if sim.status() == RunStatus::Running {
            sim.mark_stopped(StopReason::Requested);
            info!("scheduler stopped");
            Ok(StopTransition::Stopped)
        } else {
            Ok(StopTransition::AlreadyIdle)
        }
    }

    /// Register or clear a force; a non-null force wakes an idle loop.
    pub fn apply_force(&mut self, id: impl Into<ForceId>, force: Option<Force>) -> SimResult<bool> {
        let (applied, idle) = {
            let mut sim = self.lock()?;
            let applied = sim.apply_force(id, force)?;
            (applied, sim.status() == RunStatus::Idle)
        };
        if applied && idle {
            self.run(None)?;
        }
        Ok(applied)
    }

    /// Reconfigure, restarting the loop when the cadence changed.
    pub fn configure(&mut self, update: &ParamUpdate) -> SimResult<ConfigureOutcome> {
        let (outcome, running) = {
            let mut sim = self.lock()?;
            let outcome = sim.configure(update)?;
            (outcome, sim.status() == RunStatus::Running)
        };
        if outcome.restart_required && running {
            self.stop()?;
            self.run(None)?;
        }
        Ok(outcome)
    }

    fn halt_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.cancel.store(true, Ordering::Release);
        worker.handle.thread().unpark();
        if worker.handle.join().is_err() {
            warn!("scheduler worker panicked");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn worker_loop(sim: &Mutex<Simulation>, cancel: &AtomicBool, interval: Duration) {
    let mut next = Instant::now();
    loop {
        let quiescent = {
            let Ok(mut guard) = sim.lock() else {
                warn!("simulation lock poisoned; scheduler exiting");
                return;
            };
            if cancel.load(Ordering::Acquire) {
                return;
            }
            match guard.tick() {
                Ok(report) => report.step.quiescent,
                Err(e) => {
                    warn!(error = %e, "tick failed; scheduler exiting");
                    guard.mark_stopped(StopReason::Failed);
                    return;
                }
            }
        };
        if quiescent {
            return;
        }

        next += interval;
        let now = Instant::now();
        if next < now {
            // fell behind; drop the missed ticks
            next = now;
        }
        if !wait_until(next, cancel) {
            return;
        }
    }
}

// false when cancelled while waiting
fn wait_until(deadline: Instant, cancel: &AtomicBool) -> bool {
    loop {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
}
