//! Export per-observation residuals to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{FittedModel, TimeSeries};
use crate::error::AppError;

/// Write `x, y_obs, y_fit, residual` rows for every observation of every fit.
pub fn write_residuals_csv(path: &Path, series: &TimeSeries, fits: &[FittedModel]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_residuals(&mut file, series, fits)
}

fn write_residuals<W: Write>(out: &mut W, series: &TimeSeries, fits: &[FittedModel]) -> Result<(), AppError> {
    writeln!(out, "series,family,x,y_obs,y_fit,residual")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for fit in fits {
        let family = fit.family().slug();
        for ((&x, &y), &r) in series.x.iter().zip(series.y.iter()).zip(fit.residuals.iter()) {
            writeln!(
                out,
                "{},{},{},{:.6},{:.6},{:.6}",
                series.name,
                family,
                x,
                y,
                y - r,
                r
            )
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
        }
    }

    Ok(())
}
