//! Affine normalization into a reference interval.
//!
//! Raw inputs span wildly different magnitudes (day-of-year indices around
//! 50–150, counts from single digits to hundreds of thousands). Fitting in a
//! bounded space keeps the solver's Jacobian well scaled regardless of the
//! series.
//!
//! The transform is `normalized = scale * raw + offset`, chosen so that
//! `min(raw) → lower` and `max(raw) → upper`.

use serde::{Deserialize, Serialize};

use crate::error::{Axis, FitError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationTransform {
    pub scale: f64,
    pub offset: f64,
}

impl NormalizationTransform {
    pub fn apply(&self, raw: f64) -> f64 {
        self.scale * raw + self.offset
    }

    pub fn invert(&self, normalized: f64) -> f64 {
        (normalized - self.offset) / self.scale
    }
}

/// Normalize `values` into `[lower, upper]`.
///
/// Bounds given in the wrong order are swapped. Constant (or empty) input has
/// no valid transform and yields `DegenerateRange` for `axis`.
pub fn normalize(
    values: &[f64],
    lower: f64,
    upper: f64,
    axis: Axis,
) -> Result<(Vec<f64>, NormalizationTransform)> {
    let (lower, upper) = if lower > upper { (upper, lower) } else { (lower, upper) };

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return Err(FitError::DegenerateRange { axis });
    }

    let scale = (upper - lower) / range;
    let transform = NormalizationTransform {
        scale,
        offset: lower - min * scale,
    };
    let normalized = values.iter().map(|&v| transform.apply(v)).collect();
    Ok((normalized, transform))
}

/// Exact inverse of [`normalize`].
pub fn normalize_back(values: &[f64], transform: &NormalizationTransform) -> Vec<f64> {
    values.iter().map(|&v| transform.invert(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn maps_extremes_onto_bounds() {
        let v = [27.0, 35.0, 351.0, 140.0];
        let (n, t) = normalize(&v, 0.3, 1.0, Axis::Y).unwrap();
        assert_relative_eq!(n[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(n[2], 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.apply(351.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn round_trip_is_exact() {
        let cases: [(&[f64], f64, f64); 3] = [
            (&[55.0, 56.0, 57.0, 60.0, 65.0], 0.3, 1.0),
            (&[1.0, 1e5, 3.0, 42.0], -2.0, 7.5),
            (&[-3.5, 0.0, 12.25], 0.0, 1.0),
        ];
        for (values, lower, upper) in cases {
            let (n, t) = normalize(values, lower, upper, Axis::X).unwrap();
            let back = normalize_back(&n, &t);
            for (a, b) in values.iter().zip(back.iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-9, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn swapped_bounds_behave_identically() {
        let v = [3.0, 9.0, 4.0, 10.0];
        let (a, ta) = normalize(&v, 0.3, 1.0, Axis::Y).unwrap();
        let (b, tb) = normalize(&v, 1.0, 0.3, Axis::Y).unwrap();
        assert_eq!(a, b);
        assert_eq!(ta, tb);
    }

    #[test]
    fn constant_input_is_degenerate() {
        let err = normalize(&[5.0, 5.0, 5.0], 0.3, 1.0, Axis::Y).unwrap_err();
        assert_eq!(err, FitError::DegenerateRange { axis: Axis::Y });
        assert!(normalize(&[], 0.3, 1.0, Axis::X).is_err());
    }
}
