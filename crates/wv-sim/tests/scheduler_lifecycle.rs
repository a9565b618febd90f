//! Scheduler state machine against a live worker thread.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use wv_sim::{
    Force, GeneratorBounds, ParamUpdate, RunStatus, RunTransition, Scheduler, Simulation,
    StopReason, StopTransition, TransientGenerator, WaveParams, WaveState,
};

fn resting(n: usize) -> Simulation {
    let params = WaveParams {
        n,
        ..WaveParams::default()
    };
    let engine = WaveState::with_initial_conditions(params, &vec![0.0; n], &vec![0.0; n])
        .expect("valid engine");
    Simulation::from_engine(engine)
}

fn wait_for_idle(scheduler: &Scheduler) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if scheduler.status().unwrap() == RunStatus::Idle {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn uniform_force_wakes_idle_scheduler() {
    let n = 10;
    let mut scheduler = Scheduler::new(resting(n));
    assert_eq!(scheduler.status().unwrap(), RunStatus::Idle);

    let applied = scheduler
        .apply_force("test", Some(Force::Uniform(1.0)))
        .unwrap();
    assert!(applied);
    assert_eq!(scheduler.status().unwrap(), RunStatus::Running);

    let net = scheduler
        .with_simulation(|sim| sim.forces().net_force().to_vec())
        .unwrap();
    assert!(net[1..n - 1].iter().all(|&v| v == 1.0));
    assert!(scheduler.is_force_applied("test").unwrap());

    assert_eq!(scheduler.stop().unwrap(), StopTransition::Stopped);
    assert_eq!(scheduler.stop_reason().unwrap(), Some(StopReason::Requested));
    assert_eq!(scheduler.stop().unwrap(), StopTransition::AlreadyIdle);
}

#[test]
fn quiescence_is_distinguishable_from_stop() {
    let mut scheduler = Scheduler::new(resting(10));
    assert_eq!(scheduler.run(None).unwrap(), RunTransition::Started);

    assert!(wait_for_idle(&scheduler), "scheduler never went idle");
    assert_eq!(scheduler.stop_reason().unwrap(), Some(StopReason::Quiescent));
    assert_eq!(scheduler.stop().unwrap(), StopTransition::AlreadyIdle);
    assert_eq!(scheduler.stop_reason().unwrap(), Some(StopReason::Quiescent));
}

#[test]
fn callback_receives_every_delivered_state() {
    let n = 12;
    let mut scheduler = Scheduler::new(resting(n));
    let (tx, rx) = mpsc::channel();
    scheduler
        .run(Some(Box::new(move |state: &[f64], engine: &WaveState| {
            let _ = tx.send((state.to_vec(), engine.steps()));
        })))
        .unwrap();

    let (state, step) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(state.len(), n);
    assert_eq!(step, 1);
    scheduler.stop().unwrap();
}

#[test]
fn running_twice_restarts() {
    let mut scheduler = Scheduler::new(resting(10));
    scheduler
        .apply_force("hold", Some(Force::Uniform(2.0)))
        .unwrap();
    assert_eq!(scheduler.run(None).unwrap(), RunTransition::Restarted);
    assert_eq!(scheduler.status().unwrap(), RunStatus::Running);
    scheduler.stop().unwrap();
}

#[test]
fn cadence_change_restarts_running_loop() {
    let mut scheduler = Scheduler::new(resting(10));
    scheduler
        .apply_force("hold", Some(Force::Uniform(1.0)))
        .unwrap();

    let outcome = scheduler
        .configure(&ParamUpdate {
            dt: Some(0.002),
            ..ParamUpdate::default()
        })
        .unwrap();
    assert!(outcome.restart_required);
    assert_eq!(scheduler.status().unwrap(), RunStatus::Running);

    let outcome = scheduler
        .configure(&ParamUpdate {
            beta: Some(3.0),
            ..ParamUpdate::default()
        })
        .unwrap();
    assert!(!outcome.restart_required);
    assert_eq!(scheduler.status().unwrap(), RunStatus::Running);

    let tick = scheduler
        .with_simulation(|sim| sim.engine().tick_interval())
        .unwrap();
    assert_eq!(tick, Duration::from_millis(2));
    scheduler.stop().unwrap();
}

#[test]
fn expired_generator_does_not_wake_scheduler() {
    let mut scheduler = Scheduler::new(resting(10));
    let generator = TransientGenerator::new(vec![1.0; 10], |_| 1.0).with_bounds(GeneratorBounds {
        max_time: Some(Duration::ZERO),
        ..GeneratorBounds::default()
    });
    let applied = scheduler
        .apply_force("pulse", Some(Force::generator(generator)))
        .unwrap();
    assert!(!applied);
    assert_eq!(scheduler.status().unwrap(), RunStatus::Idle);
}
