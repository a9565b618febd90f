//! Self-expiring force sources.
//!
//! A [`TransientGenerator`] multiplies a force shape by a time envelope on
//! every invocation and ends itself once one of its bounds is crossed.

use std::f64::consts::PI;
use std::fmt;
use std::time::{Duration, Instant};

use wv_core::{Real, mode_shape, pulse_profile};

use crate::force::{Force, ForceGenerator, ForceValue};

/// Spatial part of a transient force.
pub enum ForceShape {
    Fixed(Vec<Real>),
    /// Rebuilt on every invocation from the invocation index.
    Dynamic(Box<dyn FnMut(usize) -> Vec<Real> + Send>),
}

impl From<Vec<Real>> for ForceShape {
    fn from(values: Vec<Real>) -> Self {
        Self::Fixed(values)
    }
}

/// Optional limits on a generator's lifetime and output.
///
/// Value limits are checked against the signed peak (largest magnitude
/// entry) of the produced vector and only once `min_time` has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeneratorBounds {
    /// Value limits are ignored before this much wall-clock time.
    pub min_time: Option<Duration>,
    /// Terminate once this much wall-clock time has elapsed.
    pub max_time: Option<Duration>,
    /// Terminate when the peak magnitude drops below this.
    pub min_value: Option<Real>,
    /// Terminate when the peak magnitude exceeds this.
    pub max_value: Option<Real>,
    /// Terminate when the signed peak reaches or passes through this value
    /// between two invocations.
    pub terminal_value: Option<Real>,
}

impl GeneratorBounds {
    fn crossed(&self, peak: Real, previous: Option<Real>) -> bool {
        let magnitude = peak.abs();
        if self.min_value.is_some_and(|min| magnitude < min) {
            return true;
        }
        if self.max_value.is_some_and(|max| magnitude > max) {
            return true;
        }
        match (self.terminal_value, previous) {
            (Some(t), _) if peak == t => true,
            (Some(t), Some(prev)) => (prev - t) * (peak - t) < 0.0,
            _ => false,
        }
    }
}

/// Force shape times envelope, bounded in time and value.
pub struct TransientGenerator {
    shape: ForceShape,
    envelope: Box<dyn FnMut(usize) -> Real + Send>,
    bounds: GeneratorBounds,
    started: Instant,
    invocation: usize,
    value: Vec<Real>,
    last_peak: Option<Real>,
}

impl TransientGenerator {
    /// `envelope` receives the 0-based invocation index.
    pub fn new(
        shape: impl Into<ForceShape>,
        envelope: impl FnMut(usize) -> Real + Send + 'static,
    ) -> Self {
        Self {
            shape: shape.into(),
            envelope: Box::new(envelope),
            bounds: GeneratorBounds::default(),
            started: Instant::now(),
            invocation: 0,
            value: Vec::new(),
            last_peak: None,
        }
    }

    pub fn with_bounds(mut self, bounds: GeneratorBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Override the creation timestamp used for `min_time`/`max_time`.
    pub fn started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    pub fn bounds(&self) -> &GeneratorBounds {
        &self.bounds
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn invocations(&self) -> usize {
        self.invocation
    }

    /// Most recently produced vector (empty before the first advance).
    pub fn value(&self) -> &[Real] {
        &self.value
    }
}

impl ForceGenerator for TransientGenerator {
    fn advance(&mut self) -> Option<ForceValue> {
        let elapsed = self.started.elapsed();
        if self.bounds.max_time.is_some_and(|max| elapsed >= max) {
            return None;
        }

        let i = self.invocation;
        self.invocation += 1;
        let env = (self.envelope)(i);

        self.value.clear();
        match &mut self.shape {
            ForceShape::Fixed(shape) => self.value.extend(shape.iter().map(|s| s * env)),
            ForceShape::Dynamic(make) => self.value.extend(make(i).into_iter().map(|s| s * env)),
        }

        let peak = signed_peak(&self.value);
        let previous = self.last_peak.replace(peak);
        let armed = self.bounds.min_time.is_none_or(|min| elapsed >= min);
        if armed && self.bounds.crossed(peak, previous) {
            return None;
        }
        Some(ForceValue::Vector(self.value.clone()))
    }
}

impl fmt::Debug for TransientGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientGenerator")
            .field("bounds", &self.bounds)
            .field("invocation", &self.invocation)
            .finish_non_exhaustive()
    }
}

fn signed_peak(values: &[Real]) -> Real {
    values
        .iter()
        .copied()
        .fold(0.0, |best, v| if v.abs() > best.abs() { v } else { best })
}

/// Sinusoidal excitation of one standing-wave mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeExcitation {
    /// Harmonic number, 1 = fundamental.
    pub mode: usize,
    /// Drive frequency (Hz, simulated time).
    pub frequency: Real,
    pub amplitude: Real,
    /// Exponential envelope decay rate (1/s); 0 keeps a steady sinusoid.
    pub decay: Real,
}

/// Generator driving `excitation.mode` with `sin(f * 2pi * (i + 1) * dt)`.
pub fn mode_generator(
    n: usize,
    dt: Real,
    excitation: ModeExcitation,
    bounds: GeneratorBounds,
) -> TransientGenerator {
    let shape: Vec<Real> = mode_shape(n, excitation.mode)
        .into_iter()
        .map(|v| v * excitation.amplitude)
        .collect();
    let ModeExcitation {
        frequency, decay, ..
    } = excitation;
    TransientGenerator::new(shape, move |i| {
        let t = (i + 1) as Real * dt;
        (frequency * 2.0 * PI * t).sin() * (-decay * t).exp()
    })
    .with_bounds(bounds)
}

/// Gaussian push of `amplitude` centred at `position` (0..=1 along the string).
pub fn pluck_force(n: usize, amplitude: Real, position: Real) -> Force {
    Force::Vector(pluck_profile(n, amplitude, position))
}

/// A pluck held for `hold` of wall-clock time, then released.
pub fn pluck_generator(
    n: usize,
    amplitude: Real,
    position: Real,
    hold: Duration,
) -> TransientGenerator {
    TransientGenerator::new(pluck_profile(n, amplitude, position), |_| 1.0).with_bounds(
        GeneratorBounds {
            max_time: Some(hold),
            ..GeneratorBounds::default()
        },
    )
}

fn pluck_profile(n: usize, amplitude: Real, position: Real) -> Vec<Real> {
    let last = n.saturating_sub(1) as Real;
    let width = (last / 20.0).max(1.0);
    pulse_profile(n, amplitude, position.clamp(0.0, 1.0) * last, width)
}
