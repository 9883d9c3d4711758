//! Read/write curve JSON files.
//!
//! Curve JSON is the portable representation of a fit, consumed by plotting
//! collaborators:
//! - model family + parameters (original units)
//! - residual spread
//! - derived points (inflection, peak, asymptotes, slope crossings)
//! - the dense prediction curve
//!
//! The schema is defined by `domain::CurveFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;
use log::info;

use crate::domain::{CurveFile, DerivedPoint, FittedModel};
use crate::error::AppError;

/// Assemble the on-disk representation of a fit.
pub fn curve_file(fit: &FittedModel, derived_points: &[DerivedPoint]) -> CurveFile {
    CurveFile {
        tool: format!("epi {}", env!("CARGO_PKG_VERSION")),
        generated_at: Utc::now(),
        series: fit.series.clone(),
        parameters: fit.parameters,
        residual_stddev: fit.residual_stddev,
        derived_points: derived_points.to_vec(),
        grid: fit.curve.clone(),
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, curve)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;

    info!("wrote curve for '{}' to {}", curve.series, path.display());
    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    Ok(curve)
}
