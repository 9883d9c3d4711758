//! Shared "fit pipeline" logic used by the `fit` and `demo` commands.
//!
//! One series, several families: fit each, attach derived points, and keep
//! whatever succeeded. Presentation stays in `app` / `report`.

use std::path::{Path, PathBuf};

use log::warn;

use crate::analytics::derived_points;
use crate::domain::{DerivedPoint, FitConfig, FittedModel, ModelFamily, TimeSeries};
use crate::error::AppError;
use crate::fit::fit_batch;

/// A successful fit together with its derived points.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub fit: FittedModel,
    pub points: Vec<DerivedPoint>,
}

/// Fit `series` with every requested family.
///
/// Failed families are logged and skipped; if none succeeds, the first error is returned.
pub fn fit_series(
    series: &TimeSeries,
    families: &[ModelFamily],
    config: &FitConfig,
    thresholds: &[f64],
) -> Result<Vec<FitRun>, AppError> {
    let results = fit_batch(std::slice::from_ref(series), families, config);

    let mut runs = Vec::with_capacity(results.len());
    let mut first_err = None;
    for r in results {
        match r.result {
            Ok(fit) => {
                let span = fit.curve.x_span().unwrap_or((0.0, 0.0));
                let points = derived_points(&fit.parameters, thresholds, span);
                runs.push(FitRun { fit, points });
            }
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    match (runs.is_empty(), first_err) {
        (true, Some(e)) => Err(e.into()),
        (true, None) => Err(AppError::new(2, "No model family was requested.")),
        (false, Some(e)) => {
            warn!("some families failed for '{}': {e}", series.name);
            Ok(runs)
        }
        (false, None) => Ok(runs),
    }
}

/// Path for one family's curve file; a family suffix is added when several are written.
pub fn curve_path(base: &Path, family: ModelFamily, multiple: bool) -> PathBuf {
    if !multiple {
        return base.to_path_buf();
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("curve");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("json");
    base.with_file_name(format!("{stem}_{}.{ext}", family.slug()))
}

/// Write one curve JSON per run.
pub fn export_curves(base: &Path, runs: &[FitRun]) -> Result<(), AppError> {
    let multiple = runs.len() > 1;
    for run in runs {
        let path = curve_path(base, run.fit.family(), multiple);
        let curve = crate::io::curve_file(&run.fit, &run.points);
        crate::io::write_curve_json(&path, &curve)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::reference_series;
    use crate::domain::PointKind;

    #[test]
    fn single_family_keeps_the_base_path() {
        let base = Path::new("out/curve.json");
        assert_eq!(curve_path(base, ModelFamily::Sigmoid, false), PathBuf::from("out/curve.json"));
        assert_eq!(
            curve_path(base, ModelFamily::LogisticDistribution, true),
            PathBuf::from("out/curve_logistic_distribution.json")
        );
    }

    #[test]
    fn exponential_run_has_no_derived_points() {
        let runs = fit_series(
            &reference_series(),
            &[ModelFamily::Exponential],
            &FitConfig::default(),
            &[1.0],
        )
        .unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].points.is_empty());
    }

    #[test]
    fn sigmoid_run_reports_inflection_and_asymptotes() {
        let x: Vec<f64> = (0..41).map(f64::from).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&xi| 10.0 + 1000.0 / (1.0 + (-0.3 * (xi - 20.0)).exp()))
            .collect();
        let series = TimeSeries::new("s", x, y).unwrap();

        let runs = fit_series(&series, &[ModelFamily::Sigmoid], &FitConfig::default(), &[]).unwrap();
        let kinds: Vec<_> = runs[0].points.iter().map(|p| p.kind).collect();
        assert!(kinds.contains(&PointKind::Inflection));
        assert!(kinds.contains(&PointKind::AsymptoteLower));
        assert!(kinds.contains(&PointKind::AsymptoteUpper));
    }

    #[test]
    fn all_failures_surface_the_first_error() {
        let series = TimeSeries::new("tiny", vec![1.0, 2.0], vec![3.0, 4.0]).unwrap();
        let err = fit_series(&series, &[ModelFamily::Sigmoid], &FitConfig::default(), &[]).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
