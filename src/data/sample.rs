//! Built-in sample series.
//!
//! - the reference intensive-care series (days 55–65) used in examples and tests
//! - seeded synthetic outbreaks following a sigmoid cumulative curve, with
//!   optional multiplicative (log-normal) reporting noise

use std::ops::Range;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::TimeSeries;
use crate::error::{FitError, Result};

const REFERENCE_DAYS: Range<i32> = 55..66;
const REFERENCE_COUNTS: [f64; 11] = [27.0, 35.0, 35.0, 56.0, 64.0, 105.0, 140.0, 166.0, 229.0, 295.0, 351.0];

/// Multiplicative noise settings for synthetic samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSpec {
    /// Standard deviation of the log-noise (e.g. `0.05` ≈ 5% reporting error).
    pub sigma: f64,
    pub seed: u64,
}

/// Eleven days of early-outbreak intensive-care counts.
pub fn reference_series() -> TimeSeries {
    TimeSeries {
        name: "reference".to_string(),
        x: REFERENCE_DAYS.map(f64::from).collect(),
        y: REFERENCE_COUNTS.to_vec(),
    }
}

/// Cumulative counts following `c / (1 + e^{-k(x-x0)}) + y0` over `days`.
///
/// Without noise the exact curve values are returned; with noise each value is
/// multiplied by `exp(sigma·z)`, `z ~ N(0, 1)`, and rounded to a whole count.
pub fn synthetic_outbreak(
    name: &str,
    days: Range<i32>,
    x0: f64,
    y0: f64,
    c: f64,
    k: f64,
    noise: Option<NoiseSpec>,
) -> TimeSeries {
    let x: Vec<f64> = days.map(f64::from).collect();
    let clean = x.iter().map(|&v| c / (1.0 + (-k * (v - x0)).exp()) + y0);

    let y = match noise.and_then(|n| Normal::new(0.0, n.sigma).ok().map(|d| (n.seed, d))) {
        None => clean.collect(),
        Some((seed, normal)) => {
            let mut rng = StdRng::seed_from_u64(seed);
            clean
                .map(|v| (v * normal.sample(&mut rng).exp()).round().max(0.0))
                .collect()
        }
    };

    TimeSeries {
        name: name.to_string(),
        x,
        y,
    }
}

/// Validate user-supplied noise settings (CLI).
pub fn noise_spec(sigma: f64, seed: u64) -> Result<Option<NoiseSpec>> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(FitError::InvalidInput(format!(
            "Noise sigma must be finite and >= 0, got {sigma}."
        )));
    }
    Ok((sigma > 0.0).then_some(NoiseSpec { sigma, seed }))
}
