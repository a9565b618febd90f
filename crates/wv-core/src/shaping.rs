//! Scalar shaping helpers and the standard string profiles.
//!
//! None of these sit on the per-step hot path; they build initial conditions
//! and force shapes.

use crate::Real;
use std::f64::consts::PI;

/// Smooth upper clamp: tends to `max` for `x << max` and to `x` for `x >> max`.
///
/// `degree` controls the sharpness of the knee.
pub fn softmax(x: Real, max: Real, degree: Real) -> Real {
    (((x * degree).exp() + (max * degree).exp()) / 2.0).ln() / degree
}

/// Mirror of [`softmax`].
pub fn softmin(x: Real, min: Real, degree: Real) -> Real {
    -softmax(-x, -min, degree)
}

/// Gaussian envelope `amplitude * exp(-((x - mu) / sigma)^2)`.
pub fn pulse(amplitude: Real, x: Real, mu: Real, sigma: Real) -> Real {
    amplitude * (-((x - mu) / sigma).powi(2)).exp()
}

/// Default initial displacement: a gaussian-enveloped sinusoid over `n` points.
pub fn gaussian_sine(n: usize) -> Vec<Real> {
    (0..n)
        .map(|i| {
            let x = i as Real;
            pulse(10.0, x, 10.0, 20.0) * (30.0 * 2.0 * PI * x / n as Real).sin()
        })
        .collect()
}

/// Gaussian bump of `amplitude` centred on point index `center`.
pub fn pulse_profile(n: usize, amplitude: Real, center: Real, width: Real) -> Vec<Real> {
    (0..n)
        .map(|i| pulse(amplitude, i as Real, center, width))
        .collect()
}

/// Standing-wave shape of harmonic `mode` (1 = fundamental); zero at both ends.
pub fn mode_shape(n: usize, mode: usize) -> Vec<Real> {
    let last = n.saturating_sub(1).max(1) as Real;
    (0..n)
        .map(|i| (mode as Real * PI * i as Real / last).sin())
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn softmax_sits_within_ln2_of_the_larger_argument(
            x in -50.0_f64..50.0,
            max in -50.0_f64..50.0,
            degree in 0.1_f64..10.0,
        ) {
            let hi = x.max(max);
            let y = softmax(x, max, degree);
            prop_assert!(y <= hi + 1e-9);
            prop_assert!(y >= hi - 2.0_f64.ln() / degree - 1e-9);
            prop_assert!((softmin(x, max, degree) + softmax(-x, -max, degree)).abs() < 1e-9);
        }

        #[test]
        fn pulse_is_bounded_by_its_peak(
            amplitude in -100.0_f64..100.0,
            x in -100.0_f64..100.0,
            mu in -100.0_f64..100.0,
            sigma in 0.01_f64..50.0,
        ) {
            prop_assert_eq!(pulse(amplitude, mu, mu, sigma), amplitude);
            prop_assert!(pulse(amplitude, x, mu, sigma).abs() <= amplitude.abs());
        }

        #[test]
        fn mode_shapes_vanish_at_both_ends(n in 3usize..200, mode in 1usize..40) {
            let shape = mode_shape(n, mode);
            prop_assert_eq!(shape.len(), n);
            prop_assert_eq!(shape[0], 0.0);
            prop_assert!(shape[n - 1].abs() < 1e-9);
        }
    }
}
