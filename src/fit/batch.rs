//! Batch fitting of many independent series.
//!
//! Every `(series, family)` pair is an independent job with its own
//! normalization transforms, so jobs run on the rayon pool with no shared
//! state. Output order follows input order (series-major, then family), and a
//! failed job is reported alongside the successes rather than aborting the batch.

use log::warn;
use rayon::prelude::*;

use crate::domain::{FitConfig, FittedModel, ModelFamily, TimeSeries};
use crate::error::FitError;
use crate::fit::fitter::fit;

/// Outcome of one `(series, family)` job.
#[derive(Debug, Clone)]
pub struct SeriesFit {
    pub series: String,
    pub family: ModelFamily,
    pub result: Result<FittedModel, FitError>,
}

impl SeriesFit {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fit every family to every series in parallel.
pub fn fit_batch(series: &[TimeSeries], families: &[ModelFamily], config: &FitConfig) -> Vec<SeriesFit> {
    let jobs: Vec<(&TimeSeries, ModelFamily)> = series
        .iter()
        .flat_map(|s| families.iter().map(move |&f| (s, f)))
        .collect();

    jobs.par_iter()
        .map(|&(s, family)| {
            let result = fit(s, family, config);
            if let Err(e) = &result {
                warn!("fit failed for series '{}' ({family}): {e}", s.name);
            }
            SeriesFit {
                series: s.name.clone(),
                family,
                result,
            }
        })
        .collect()
}
