//! Small numeric helpers shared by the fitter and the reports.

use std::cmp::Ordering;

/// Median of `values` (average of the two middle values for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}

/// `steps` evenly spaced points from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (steps as f64 - 1.0);
            (0..steps)
                .map(|i| if i + 1 == steps { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}
