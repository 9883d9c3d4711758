//! Closed-form derived points of fitted curves: inflection, peak, asymptotes and slope crossings.

use log::warn;

use crate::domain::{DerivedPoint, LogisticParams, ModelParameters, PointKind, SigmoidParams};
use crate::error::{FitError, Result};

/// Inflection point of a sigmoid: `(x0, y0 + c/2)`.
pub fn sigmoid_flex(p: &SigmoidParams) -> DerivedPoint {
    DerivedPoint::new(PointKind::Inflection, p.x0, p.y0 + p.c / 2.0)
}

/// Lower and upper asymptotes `(y0, y0 + c)`.
pub fn sigmoid_asymptotes(p: &SigmoidParams) -> (f64, f64) {
    (p.y0, p.y0 + p.c)
}

/// Maximum of the logistic-distribution bell: `(x0, c·k/4 + y0)`.
pub fn logistic_distribution_peak(p: &LogisticParams) -> DerivedPoint {
    DerivedPoint::new(PointKind::Peak, p.x0, p.c * p.k / 4.0 + p.y0)
}

/// Instantaneous slope of the sigmoid, `c·k·s(1-s)` with `s` the logistic term.
pub fn sigmoid_first_derivative(p: &SigmoidParams, x: f64) -> f64 {
    let s = 1.0 / (1.0 + (-p.k * (x - p.x0)).exp());
    p.c * p.k * s * (1.0 - s)
}

/// Maximum slope of the sigmoid (attained at `x0`).
pub fn sigmoid_max_slope(p: &SigmoidParams) -> f64 {
    p.c * p.k / 4.0
}

/// The two x-values where the sigmoid's slope equals `alpha`, earliest first.
///
/// With `z = e^{-k(x-x0)}` the condition `f'(x) = alpha` becomes
/// `alpha·z² + (2·alpha - c·k)·z + alpha = 0`, whose roots are `b ± a` with
///
/// ```text
/// a = sqrt(c²k² - 4·alpha·c·k) / (2·alpha)
/// b = (c·k - 2·alpha) / (2·alpha)
/// ```
///
/// and `x = x0 - ln(z)/k`.
pub fn sigmoid_slope_threshold_crossings(p: &SigmoidParams, alpha: f64) -> Result<(f64, f64)> {
    let ck = p.c * p.k;
    let no_crossing = FitError::NoCrossing {
        alpha,
        max_slope: sigmoid_max_slope(p),
    };
    if !(alpha.is_finite() && alpha > 0.0) {
        return Err(no_crossing);
    }

    let disc = ck * ck - 4.0 * alpha * ck;
    if !(disc >= 0.0) {
        return Err(no_crossing);
    }

    let a = disc.sqrt() / (2.0 * alpha);
    let b = (ck - 2.0 * alpha) / (2.0 * alpha);
    let z1 = a + b;
    if !(z1.is_finite() && z1 > 0.0) {
        return Err(no_crossing);
    }
    // z1·z2 = 1; `b - a` cancels badly for small alpha.
    let z2 = 1.0 / z1;

    let x1 = p.x0 - z1.ln() / p.k;
    let x2 = p.x0 - z2.ln() / p.k;
    Ok(if x1 <= x2 { (x1, x2) } else { (x2, x1) })
}

/// Every derived point for the fitted family.
///
/// `span` is the x range of the dense curve; asymptotes are pinned to its ends
/// so consumers always get finite coordinates. Thresholds the curve never
/// reaches are skipped.
pub fn derived_points(params: &ModelParameters, thresholds: &[f64], span: (f64, f64)) -> Vec<DerivedPoint> {
    let mut out = Vec::new();
    match params {
        ModelParameters::Exponential(_) => {}
        ModelParameters::Sigmoid(p) => {
            out.push(sigmoid_flex(p));

            let (lower, upper) = sigmoid_asymptotes(p);
            let (left, right) = if p.k >= 0.0 { span } else { (span.1, span.0) };
            out.push(DerivedPoint::new(PointKind::AsymptoteLower, left, lower));
            out.push(DerivedPoint::new(PointKind::AsymptoteUpper, right, upper));

            for &alpha in thresholds {
                match sigmoid_slope_threshold_crossings(p, alpha) {
                    Ok((early, late)) => {
                        for x in [early, late] {
                            out.push(DerivedPoint {
                                kind: PointKind::ThresholdCrossing,
                                x,
                                y: params.evaluate(x),
                                alpha: Some(alpha),
                            });
                        }
                    }
                    Err(e) => warn!("skipping slope threshold: {e}"),
                }
            }
        }
        ModelParameters::LogisticDistribution(p) => {
            out.push(logistic_distribution_peak(p));
        }
    }
    out
}
