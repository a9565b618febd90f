//! Damped, forced vibrating-string simulation.
//!
//! Provides:
//! - Explicit leapfrog finite-difference engine with fixed ends
//! - Force registry composing static, callback and generator sources
//! - Self-expiring transient force generators
//! - Deterministic tick loop plus a fixed-cadence threaded scheduler
//! - Energy-based auto-quiescence

pub mod engine;
pub mod error;
pub mod force;
pub mod generator;
pub mod params;
pub mod scheduler;
pub mod simulation;

// Re-exports for public API
pub use engine::{ConfigureOutcome, R2_EPSILON, StepReport, WaveState};
pub use error::{SimError, SimResult};
pub use force::{Force, ForceCallback, ForceGenerator, ForceId, ForceRegistry, ForceUpdate, ForceValue};
pub use generator::{
    ForceShape, GeneratorBounds, ModeExcitation, TransientGenerator, mode_generator, pluck_force,
    pluck_generator,
};
pub use params::{ParamUpdate, WaveParams};
pub use scheduler::{RunTransition, Scheduler, SharedSimulation, StopTransition};
pub use simulation::{PreStepHook, RunStatus, Simulation, StepCallback, StopReason, TickReport};
