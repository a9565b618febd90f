//! Explicit finite-difference engine for the damped, forced string.
//!
//! The engine keeps exactly two displacement snapshots and flips between
//! them every step. End points are fixed at zero.

use std::time::Duration;

use tracing::debug;
use wv_core::{Real, ensure_all_finite, ensure_len, gaussian_sine};

use crate::error::{SimError, SimResult};
use crate::params::{ParamUpdate, WaveParams};

/// Margin keeping the squared Courant number strictly inside (0, 1).
pub const R2_EPSILON: Real = 1e-4;

/// Result of [`WaveState::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureOutcome {
    /// `dt` or `speed_up` changed, so a running scheduler must pick up the
    /// new cadence.
    pub restart_required: bool,
}

/// Summary of one [`WaveState::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Steps taken since the last initialize.
    pub step: u64,
    /// Energy proxy computed from the new interior points.
    pub energy: Real,
    /// The energy fell below the threshold and the string was zeroed.
    pub quiescent: bool,
}

/// Two-level displacement buffer plus the parameters that drive it.
#[derive(Debug, Clone)]
pub struct WaveState {
    params: WaveParams,
    dx: Real,
    r2: Real,
    nf: Real,
    u: [Vec<Real>; 2],
    // index of the current snapshot in `u`
    k: usize,
    energy: Real,
    steps: u64,
}

impl WaveState {
    /// Engine with the default initial displacement and zero velocity.
    pub fn new(params: WaveParams) -> SimResult<Self> {
        let fx0 = gaussian_sine(params.n);
        let gx0 = vec![0.0; params.n];
        Self::with_initial_conditions(params, &fx0, &gx0)
    }

    /// Engine from an explicit initial displacement `fx0` and velocity `gx0`.
    pub fn with_initial_conditions(
        params: WaveParams,
        fx0: &[Real],
        gx0: &[Real],
    ) -> SimResult<Self> {
        params.validate()?;
        let n = params.n;
        let mut state = Self {
            params,
            dx: 0.0,
            r2: 0.0,
            nf: 0.0,
            u: [vec![0.0; n], vec![0.0; n]],
            k: 0,
            energy: 0.0,
            steps: 0,
        };
        state.recompute_derived();
        state.initialize(fx0, gx0)?;
        Ok(state)
    }

    /// Seed both snapshots from position and velocity data.
    ///
    /// The previous snapshot becomes `fx0` (ends forced to zero) and the
    /// current one is a half-step Taylor estimate built from `fx0`, `gx0`.
    pub fn initialize(&mut self, fx0: &[Real], gx0: &[Real]) -> SimResult<()> {
        let n = self.params.n;
        ensure_len(fx0, n, "fx0")?;
        ensure_len(gx0, n, "gx0")?;
        ensure_all_finite(fx0, "fx0")?;
        ensure_all_finite(gx0, "gx0")?;

        let beta_dt = self.params.beta * self.params.dt;
        let damp = 1.0 + 2.0 * beta_dt;
        let carry = 1.0 - 2.0 * beta_dt;
        let r2 = self.r2;
        let dt = self.params.dt;

        let prev = 1 - self.k;
        self.u[prev].copy_from_slice(fx0);
        self.u[prev][0] = 0.0;
        self.u[prev][n - 1] = 0.0;

        let [u0, u1] = &mut self.u;
        let (f, cur) = if prev == 0 { (&*u0, u1) } else { (&*u1, u0) };
        cur[0] = 0.0;
        cur[n - 1] = 0.0;
        for i in 1..n - 1 {
            cur[i] = 0.5
                * (2.0 * (1.0 - r2) * f[i] + r2 * (f[i + 1] + f[i - 1]) - carry * dt * gx0[i])
                / damp;
        }

        self.energy = 0.0;
        self.steps = 0;
        Ok(())
    }

    /// Merge `update` into the parameters and recompute `dx`, `r2`, `nf`.
    ///
    /// `N` cannot change here; use [`WaveState::resize`].
    pub fn configure(&mut self, update: &ParamUpdate) -> SimResult<ConfigureOutcome> {
        if let Some(requested) = update.n {
            if requested != self.params.n {
                return Err(SimError::ResizeRequired {
                    current: self.params.n,
                    requested,
                });
            }
        }
        let merged = update.merged(&self.params);
        merged.validate()?;

        let restart_required =
            merged.dt != self.params.dt || merged.speed_up != self.params.speed_up;
        self.params = merged;
        self.recompute_derived();
        debug!(r2 = self.r2, nf = self.nf, restart_required, "string reconfigured");
        Ok(ConfigureOutcome { restart_required })
    }

    /// Rebuild the buffers for `n` points with the default initial conditions.
    pub fn resize(&mut self, n: usize) -> SimResult<()> {
        let params = WaveParams {
            n,
            ..self.params.clone()
        };
        *self = Self::new(params)?;
        Ok(())
    }

    fn recompute_derived(&mut self) {
        let p = &self.params;
        self.dx = p.length / p.n as Real;
        let courant = (p.t0 / p.rho * p.dt / self.dx).powi(2);
        self.r2 = if courant.is_nan() {
            R2_EPSILON
        } else {
            courant.clamp(R2_EPSILON, 1.0 - R2_EPSILON)
        };
        self.nf = p.natural_frequency();
    }

    /// Advance one time step under `net_force` and flip the buffers.
    ///
    /// After this call [`WaveState::state`] holds the new displacement.
    pub fn step(&mut self, net_force: &[Real]) -> SimResult<StepReport> {
        let n = self.params.n;
        ensure_len(net_force, n, "net_force")?;

        let dt = self.params.dt;
        let beta_dt = self.params.beta * dt;
        let damp = 1.0 + 2.0 * beta_dt;
        let carry = 1.0 - 2.0 * beta_dt;
        let forcing = self.params.f0 * dt * dt;
        let r2 = self.r2;

        let [u0, u1] = &mut self.u;
        // the previous snapshot is overwritten in place with the next one
        let (uk, next) = if self.k == 0 { (&*u0, u1) } else { (&*u1, u0) };

        let mut energy = 0.0;
        for i in 1..n - 1 {
            let value = (2.0 * (1.0 - r2) * uk[i] + r2 * (uk[i + 1] + uk[i - 1])
                - carry * next[i]
                + forcing * net_force[i])
                / damp;
            let velocity = (uk[i] - value) / dt;
            energy += value * value + velocity * velocity / 2.0;
            next[i] = value;
        }

        self.energy = energy;
        let quiescent = energy.log10() < self.params.min_log_energy;
        if quiescent {
            self.stationary();
        }
        self.k = 1 - self.k;
        self.steps += 1;

        Ok(StepReport {
            step: self.steps,
            energy,
            quiescent,
        })
    }

    /// Zero both snapshots.
    pub fn stationary(&mut self) {
        for buf in &mut self.u {
            buf.fill(0.0);
        }
        self.energy = 0.0;
    }

    /// Current displacement.
    pub fn state(&self) -> &[Real] {
        &self.u[self.k]
    }

    /// Displacement one step earlier.
    pub fn prev_state(&self) -> &[Real] {
        &self.u[1 - self.k]
    }

    /// Energy proxy of the last step: `sum(u^2 + v^2 / 2)` over the interior.
    ///
    /// Not dimensionally exact; it only drives the quiescence threshold.
    pub fn energy(&self) -> Real {
        self.energy
    }

    /// Discrete energy of the leapfrog scheme, per unit linear density.
    ///
    /// Constant when `beta == 0` and no force acts, non-increasing when
    /// `beta > 0`.
    pub fn mechanical_energy(&self) -> Real {
        let cur = self.state();
        let prev = self.prev_state();
        let kinetic: Real = cur
            .iter()
            .zip(prev)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        let strain: Real = cur
            .windows(2)
            .zip(prev.windows(2))
            .map(|(c, p)| (c[1] - c[0]) * (p[1] - p[0]))
            .sum();
        let dt = self.params.dt;
        (kinetic + self.r2 * strain) / (2.0 * dt * dt)
    }

    pub fn params(&self) -> &WaveParams {
        &self.params
    }

    pub fn n(&self) -> usize {
        self.params.n
    }

    pub fn dx(&self) -> Real {
        self.dx
    }

    /// Squared Courant number, always inside `(0, 1)`.
    pub fn r2(&self) -> Real {
        self.r2
    }

    /// First harmonic in Hz, scaled by `speed_up`.
    pub fn natural_frequency(&self) -> Real {
        self.nf
    }

    /// Wall-clock period between scheduler ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.params.dt / self.params.speed_up)
            .unwrap_or(Duration::MAX)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
