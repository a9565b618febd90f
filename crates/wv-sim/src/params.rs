//! Physical and numeric parameters of the string.

use serde::{Deserialize, Serialize};
use wv_core::{Force, Frequency, Length, LinearDensity, Real, Time, Velocity, ensure_finite};

use crate::error::{SimError, SimResult};

/// Full parameter set for a [`WaveState`](crate::WaveState).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Damping constant (1/s)
    pub beta: Real,
    /// Time step (seconds)
    pub dt: Real,
    /// Free tension (N)
    #[serde(rename = "T0")]
    pub t0: Real,
    /// Mass per unit length (kg/m)
    pub rho: Real,
    /// Number of discretization points
    #[serde(rename = "N")]
    pub n: usize,
    /// String length (m)
    #[serde(rename = "L")]
    pub length: Real,
    /// Force amplitude multiplier
    #[serde(rename = "F0", alias = "FA")]
    pub f0: Real,
    /// Wall-clock acceleration of the tick cadence
    pub speed_up: Real,
    /// Quiescence threshold on log10 of the energy proxy
    #[serde(rename = "minLogEnergy", alias = "min_log_energy")]
    pub min_log_energy: Real,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            beta: 1.0,
            dt: 0.001,
            t0: 20.0,
            rho: 3.0,
            n: 40,
            length: 1.0,
            f0: 500.0,
            speed_up: 1.0,
            min_log_energy: -3.0,
        }
    }
}

impl WaveParams {
    /// Check every field; called on construction and after each merge.
    pub fn validate(&self) -> SimResult<()> {
        ensure_finite(self.beta, "beta")?;
        ensure_finite(self.dt, "dt")?;
        ensure_finite(self.t0, "T0")?;
        ensure_finite(self.rho, "rho")?;
        ensure_finite(self.length, "L")?;
        ensure_finite(self.f0, "F0")?;
        ensure_finite(self.speed_up, "speed_up")?;
        ensure_finite(self.min_log_energy, "minLogEnergy")?;

        if self.n < 3 {
            return Err(SimError::InvalidParam {
                what: "N must be at least 3",
            });
        }
        if self.dt <= 0.0 {
            return Err(SimError::InvalidParam {
                what: "dt must be positive",
            });
        }
        if self.rho <= 0.0 {
            return Err(SimError::InvalidParam {
                what: "rho must be positive",
            });
        }
        if self.length <= 0.0 {
            return Err(SimError::InvalidParam {
                what: "L must be positive",
            });
        }
        if self.speed_up <= 0.0 {
            return Err(SimError::InvalidParam {
                what: "speed_up must be positive",
            });
        }
        Ok(())
    }

    pub fn length(&self) -> Length {
        wv_core::m(self.length)
    }

    pub fn time_step(&self) -> Time {
        wv_core::s(self.dt)
    }

    pub fn tension(&self) -> Force {
        wv_core::n(self.t0)
    }

    pub fn linear_density(&self) -> LinearDensity {
        wv_core::kgpm(self.rho)
    }

    /// Transverse wave speed `sqrt(T0 / rho)`.
    pub fn wave_speed(&self) -> Velocity {
        wv_core::mps((self.t0 / self.rho).abs().sqrt())
    }

    /// First harmonic `1/(2L) * sqrt(T0/rho) * speed_up`.
    pub fn fundamental_frequency(&self) -> Frequency {
        wv_core::hz(self.natural_frequency())
    }

    pub(crate) fn natural_frequency(&self) -> Real {
        self.string_frequency() * self.speed_up
    }

    /// First harmonic in simulated time, `1/(2L) * sqrt(T0/rho)`.
    ///
    /// Drive envelopes advance by `dt` per step, so resonant forcing uses
    /// this value rather than the playback-scaled one.
    pub fn string_frequency(&self) -> Real {
        (self.t0 / self.rho).abs().sqrt() / (2.0 * self.length)
    }
}

/// Partial parameter set; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamUpdate {
    pub beta: Option<Real>,
    pub dt: Option<Real>,
    #[serde(rename = "T0")]
    pub t0: Option<Real>,
    pub rho: Option<Real>,
    #[serde(rename = "N")]
    pub n: Option<usize>,
    #[serde(rename = "L")]
    pub length: Option<Real>,
    #[serde(rename = "F0", alias = "FA")]
    pub f0: Option<Real>,
    pub speed_up: Option<Real>,
    #[serde(rename = "minLogEnergy", alias = "min_log_energy")]
    pub min_log_energy: Option<Real>,
}

impl ParamUpdate {
    /// Apply onto a copy of `base`. `N` is taken as-is; callers decide
    /// whether a size change is allowed.
    pub fn merged(&self, base: &WaveParams) -> WaveParams {
        WaveParams {
            beta: self.beta.unwrap_or(base.beta),
            dt: self.dt.unwrap_or(base.dt),
            t0: self.t0.unwrap_or(base.t0),
            rho: self.rho.unwrap_or(base.rho),
            n: self.n.unwrap_or(base.n),
            length: self.length.unwrap_or(base.length),
            f0: self.f0.unwrap_or(base.f0),
            speed_up: self.speed_up.unwrap_or(base.speed_up),
            min_log_energy: self.min_log_energy.unwrap_or(base.min_log_energy),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
