//! wv-core: shared foundation for the wavestring workspace.
//!
//! Contains:
//! - numeric (Real + tolerances + slice validation)
//! - shaping (pulse envelope, soft max/min, default string profiles)
//! - units (uom SI types + constructors)
//! - timing (step timers and run statistics)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod shaping;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use shaping::*;
pub use units::*;
