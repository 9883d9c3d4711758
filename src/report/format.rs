//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use chrono::{Duration, NaiveDate};

use crate::domain::{CurveFile, DerivedPoint, FittedModel, ModelParameters, TimeSeries};
use crate::fit::SeriesFit;

/// Calendar label for a day-of-year index (day 1 = 1 January of `year`).
///
/// Only used for display; the engine itself works on plain numeric x.
pub fn day_label(day: f64, year: i32) -> Option<String> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let date = jan1.checked_add_signed(Duration::days(day.floor() as i64 - 1))?;
    Some(date.format("%d %b").to_string())
}

fn fmt_x(x: f64, year: Option<i32>) -> String {
    match year.and_then(|y| day_label(x, y)) {
        Some(label) => format!("{x:.2} ({label})"),
        None => format!("{x:.2}"),
    }
}

fn fmt_params(params: &ModelParameters) -> String {
    match params {
        ModelParameters::Exponential(p) => {
            format!("x0={:.4} y0={:.4} k={:.6}", p.x0, p.y0, p.k)
        }
        ModelParameters::Sigmoid(p) => {
            format!("x0={:.4} y0={:.4} c={:.4} k={:.6}", p.x0, p.y0, p.c, p.k)
        }
        ModelParameters::LogisticDistribution(p) => {
            format!("x0={:.4} y0={:.4} c={:.4} k={:.6}", p.x0, p.y0, p.c, p.k)
        }
    }
}

/// Format the dataset header for a single-series run.
pub fn format_series_header(series: &TimeSeries) -> String {
    let (x_min, x_max) = min_max(&series.x);
    let (y_min, y_max) = min_max(&series.y);
    format!(
        "=== epi - growth curve fit ===\nSeries: {} | n={} | x=[{:.1}, {:.1}] | y=[{:.1}, {:.1}]\n",
        series.name,
        series.len(),
        x_min,
        x_max,
        y_min,
        y_max
    )
}

/// Format one fitted model plus its derived points.
pub fn format_fit(fit: &FittedModel, points: &[DerivedPoint], year: Option<i32>) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}:\n", fit.family().display_name()));
    out.push_str(&format!("- params: {}\n", fmt_params(&fit.parameters)));
    out.push_str(&format!("- residual std: {:.4}\n", fit.residual_stddev));
    out.push_str(&format!(
        "- solver: {} iterations, cost={:.3e}, stop={:?}\n",
        fit.diagnostics.iterations, fit.diagnostics.cost, fit.diagnostics.termination
    ));
    if let Some((lo, hi)) = fit.curve.x_span() {
        out.push_str(&format!(
            "- curve: {} points over x=[{:.1}, {:.1}]\n",
            fit.curve.len(),
            lo,
            hi
        ));
    }

    push_points(&mut out, points, year);
    out
}

fn push_points(out: &mut String, points: &[DerivedPoint], year: Option<i32>) {
    for p in points {
        let alpha = p.alpha.map(|a| format!(" @ slope {a}")).unwrap_or_default();
        out.push_str(&format!(
            "  * {}{alpha}: x={} y={:.2}\n",
            p.kind.label(),
            fmt_x(p.x, year),
            p.y
        ));
    }
}

/// Summary of a previously exported curve file.
pub fn format_curve_file(curve: &CurveFile, year: Option<i32>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Curve '{}' ({}), written by {} at {}\n",
        curve.series,
        curve.parameters.family().display_name(),
        curve.tool,
        curve.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("- params: {}\n", fmt_params(&curve.parameters)));
    out.push_str(&format!("- residual std: {:.4}\n", curve.residual_stddev));
    if let Some((lo, hi)) = curve.grid.x_span() {
        out.push_str(&format!(
            "- curve: {} points over x=[{:.1}, {:.1}]\n",
            curve.grid.len(),
            lo,
            hi
        ));
    }
    push_points(&mut out, &curve.derived_points, year);
    out
}

/// Side-by-side comparison of residual spread (no selection is made).
pub fn format_comparison(fits: &[FittedModel]) -> String {
    let mut out = String::new();
    if fits.len() < 2 {
        return out;
    }
    out.push_str("\nResidual spread by family:\n");
    for fit in fits {
        out.push_str(&format!(
            "  {:<22} {:>12.4}\n",
            fit.family().display_name(),
            fit.residual_stddev
        ));
    }
    out
}

/// Table of batch outcomes, one row per `(series, family)`.
pub fn format_batch_table(results: &[SeriesFit]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:<22} {:>10} {:>12} {:>12}  {}\n",
        "series", "family", "x0", "k", "resid_std", "status"
    ));
    for r in results {
        match &r.result {
            Ok(fit) => {
                let p = fit.parameters.to_vec();
                out.push_str(&format!(
                    "{:<20} {:<22} {:>10.2} {:>12.5} {:>12.3}  ok\n",
                    truncate(&r.series, 20),
                    r.family.display_name(),
                    p[0],
                    p[p.len() - 1],
                    fit.residual_stddev
                ));
            }
            Err(e) => {
                out.push_str(&format!(
                    "{:<20} {:<22} {:>10} {:>12} {:>12}  {e}\n",
                    truncate(&r.series, 20),
                    r.family.display_name(),
                    "-",
                    "-",
                    "-"
                ));
            }
        }
    }
    let failed = results.iter().filter(|r| !r.is_ok()).count();
    out.push_str(&format!("\n{} fits, {} failed\n", results.len(), failed));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::reference_series;
    use crate::domain::{FitConfig, ModelFamily};
    use crate::error::FitError;
    use crate::fit::fit;

    #[test]
    fn day_labels_follow_day_of_year() {
        assert_eq!(day_label(1.0, 2020).as_deref(), Some("01 Jan"));
        // 2020 is a leap year: day 60 is 29 Feb.
        assert_eq!(day_label(60.0, 2020).as_deref(), Some("29 Feb"));
        assert_eq!(day_label(60.0, 2021).as_deref(), Some("01 Mar"));
    }

    #[test]
    fn fit_summary_lists_params_and_points() {
        let series = reference_series();
        let fit = fit(&series, ModelFamily::Exponential, &FitConfig::default()).unwrap();
        let text = format_fit(&fit, &[], Some(2020));
        assert!(text.contains("Exponential:"));
        assert!(text.contains("residual std"));
        assert!(format_series_header(&series).contains("n=11"));
    }

    #[test]
    fn curve_file_summary_names_family_and_points() {
        let series = reference_series();
        let fit = fit(&series, ModelFamily::Exponential, &FitConfig::default()).unwrap();
        let points = vec![DerivedPoint::new(crate::domain::PointKind::Inflection, 60.0, 100.0)];
        let curve = crate::io::curve_file(&fit, &points);
        let text = format_curve_file(&curve, Some(2020));
        assert!(text.contains("Curve 'reference' (Exponential)"));
        assert!(text.contains("29 Feb"));
    }

    #[test]
    fn batch_table_counts_failures() {
        let series = reference_series();
        let ok = fit(&series, ModelFamily::Exponential, &FitConfig::default()).unwrap();
        let results = vec![
            SeriesFit {
                series: "reference".into(),
                family: ModelFamily::Exponential,
                result: Ok(ok),
            },
            SeriesFit {
                series: "flat".into(),
                family: ModelFamily::Sigmoid,
                result: Err(FitError::InvalidInput("boom".into())),
            },
        ];
        let table = format_batch_table(&results);
        assert!(table.contains("2 fits, 1 failed"));
        assert!(table.contains("boom"));
    }
}
