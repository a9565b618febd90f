use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Elementwise `nearly_equal` over two slices of equal length.
pub fn slices_nearly_equal(a: &[Real], b: &[Real], tol: Tolerances) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| nearly_equal(x, y, tol))
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Fails on the first non-finite entry.
pub fn ensure_all_finite(values: &[Real], what: &'static str) -> Result<(), CoreError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(CoreError::NonFinite { what, value }),
        None => Ok(()),
    }
}

pub fn ensure_len(values: &[Real], expected: usize, what: &'static str) -> Result<(), CoreError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(CoreError::LengthMismatch {
            what,
            expected,
            actual: values.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_all_finite_reports_offending_value() {
        let err = ensure_all_finite(&[0.0, 1.0, Real::INFINITY], "force").unwrap_err();
        assert_eq!(
            err,
            CoreError::NonFinite {
                what: "force",
                value: Real::INFINITY
            }
        );
        assert!(ensure_all_finite(&[0.0, -2.0], "force").is_ok());
    }

    #[test]
    fn ensure_len_mismatch() {
        let err = ensure_len(&[1.0, 2.0], 3, "fx0").unwrap_err();
        assert_eq!(
            err,
            CoreError::LengthMismatch {
                what: "fx0",
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn slices_compare_lengths_first() {
        let tol = Tolerances::default();
        assert!(slices_nearly_equal(&[1.0, 2.0], &[1.0, 2.0], tol));
        assert!(!slices_nearly_equal(&[1.0], &[1.0, 2.0], tol));
    }
}
