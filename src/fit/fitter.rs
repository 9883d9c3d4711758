//! Fitting engine for a single series and model family.
//!
//! Steps:
//! 1. validate the series against the family's parameter count
//! 2. normalize x and y independently into `[norm_lower, norm_upper]`
//! 3. starting points from the family (median/unit-shape guess first)
//! 4. robust Levenberg–Marquardt on the normalized residuals from each start;
//!    saturated solutions are discarded and the lowest cost wins
//! 5. denormalize the solution
//! 6. build the dense curve in normalized space and map both axes back
//!
//! The dense curve is evaluated with the *normalized* parameters and mapped
//! back through `normalize_back`, so extreme denormalized values (e.g. an
//! exponential offset far outside the data) never enter an evaluation.

use log::debug;
use nalgebra::DMatrix;

use crate::domain::{CurveGrid, FitConfig, FitDiagnostics, FittedModel, ModelFamily, TimeSeries};
use crate::error::{Axis, FitError, Result};
use crate::math::stats::{linspace, std_dev};
use crate::math::{LeastSquaresProblem, Solution, SolverOptions, normalize, normalize_back, solve};
use crate::models::{denormalize, fill_jacobian_row, predict, residual, start_points};

/// A Jacobian column below this on every observation no longer shapes the curve.
const COLLAPSE_TOL: f64 = 1e-8;

/// One family over one normalized series.
struct FamilyProblem<'a> {
    family: ModelFamily,
    x: &'a [f64],
    y: &'a [f64],
}

impl LeastSquaresProblem for FamilyProblem<'_> {
    fn n_params(&self) -> usize {
        self.family.param_count()
    }

    fn n_obs(&self) -> usize {
        self.x.len()
    }

    fn residuals(&self, p: &[f64], out: &mut [f64]) {
        for (o, (&x, &y)) in out.iter_mut().zip(self.x.iter().zip(self.y.iter())) {
            *o = residual(self.family, x, y, p);
        }
    }

    fn model_jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) {
        let mut row = vec![0.0; self.family.param_count()];
        for (i, &x) in self.x.iter().enumerate() {
            fill_jacobian_row(self.family, x, p, &mut row);
            for (j, v) in row.iter().enumerate() {
                out[(i, j)] = *v;
            }
        }
    }
}

/// One solver run, with saturated or non-finite solutions reported as errors.
fn solve_from(problem: &FamilyProblem<'_>, p0: &[f64], opts: &SolverOptions) -> Result<Solution> {
    let family = problem.family;
    let solution = solve(problem, p0, opts).map_err(|f| FitError::FitConvergence {
        family,
        iterations: f.iterations,
        params: f.params,
        reason: f.reason,
    })?;

    let reject = |reason: String| FitError::FitConvergence {
        family,
        iterations: solution.iterations,
        params: solution.params.clone(),
        reason,
    };
    if solution.params.iter().any(|v| !v.is_finite()) {
        return Err(reject("non-finite normalized parameters".to_string()));
    }
    if let Some(name) = collapsed_parameter(family, problem.x, &solution.params) {
        return Err(reject(format!("curve saturated: {name} no longer affects the fit")));
    }
    Ok(solution)
}

/// First shape parameter whose Jacobian column vanished on every observation.
///
/// The additive offset `y0` always has a unit column and is skipped. A
/// collapsed column means the curve is flat over the data (a saturated
/// sigmoid, a decayed exponential) and the solver stopped on a plateau.
fn collapsed_parameter(family: ModelFamily, x_norm: &[f64], p: &[f64]) -> Option<&'static str> {
    let mut peak = vec![0.0_f64; family.param_count()];
    let mut row = vec![0.0; family.param_count()];
    for &x in x_norm {
        fill_jacobian_row(family, x, p, &mut row);
        for (m, v) in peak.iter_mut().zip(&row) {
            *m = m.max(v.abs());
        }
    }
    family
        .param_names()
        .iter()
        .zip(&peak)
        .find(|(name, m)| **name != "y0" && **m < COLLAPSE_TOL)
        .map(|(name, _)| *name)
}

/// Fit `family` to `series`.
pub fn fit(series: &TimeSeries, family: ModelFamily, config: &FitConfig) -> Result<FittedModel> {
    config.validate()?;

    if series.x.len() != series.y.len() {
        return Err(FitError::InvalidInput(format!(
            "Series '{}': x has {} values but y has {}.",
            series.name,
            series.x.len(),
            series.y.len()
        )));
    }
    let needed = family.param_count();
    if series.len() < needed {
        return Err(FitError::InsufficientData {
            family,
            needed,
            got: series.len(),
        });
    }

    let (x_norm, tx) = normalize(&series.x, config.norm_lower, config.norm_upper, Axis::X)?;
    let (y_norm, ty) = normalize(&series.y, config.norm_lower, config.norm_upper, Axis::Y)?;

    let problem = FamilyProblem {
        family,
        x: &x_norm,
        y: &y_norm,
    };
    let opts = SolverOptions {
        loss: config.loss,
        loss_scale: config.loss_scale,
        max_iterations: config.max_iterations,
        ftol: config.ftol,
        xtol: config.xtol,
        gtol: config.gtol,
    };

    let mut best: Option<Solution> = None;
    let mut first_err: Option<FitError> = None;
    for p0 in start_points(family, &x_norm, &y_norm) {
        match solve_from(&problem, &p0, &opts) {
            Ok(solution) => {
                debug!(
                    "start {:?} -> cost={:.6e} iterations={}",
                    p0, solution.cost, solution.iterations
                );
                if best.as_ref().is_none_or(|b| solution.cost < b.cost) {
                    best = Some(solution);
                }
            }
            Err(err) => {
                debug!("start {p0:?} rejected: {err}");
                first_err.get_or_insert(err);
            }
        }
    }
    let Some(solution) = best else {
        return Err(first_err.unwrap_or_else(|| FitError::InvalidInput("no starting point".to_string())));
    };

    let parameters = denormalize(family, &solution.params, &tx, &ty)?;
    if !parameters.is_finite() {
        return Err(FitError::FitConvergence {
            family,
            iterations: solution.iterations,
            params: solution.params.clone(),
            reason: "non-finite denormalized parameters".to_string(),
        });
    }

    let domain = config.domain_for(family);
    let xs_norm = linspace(domain.lower, domain.upper, config.curve_points);
    let ys_norm: Vec<f64> = xs_norm
        .iter()
        .map(|&x| predict(family, x, &solution.params))
        .collect();
    let curve = CurveGrid {
        x: normalize_back(&xs_norm, &tx),
        y: normalize_back(&ys_norm, &ty),
    };

    let residuals: Vec<f64> = series
        .x
        .iter()
        .zip(series.y.iter())
        .map(|(&x, &y)| y - parameters.evaluate(x))
        .collect();
    let residual_stddev = std_dev(&residuals);

    debug!(
        "fit series={} family={} params={:?} residual_std={:.4} iterations={}",
        series.name,
        family,
        parameters.to_vec(),
        residual_stddev,
        solution.iterations
    );

    Ok(FittedModel {
        series: series.name.clone(),
        parameters,
        curve,
        residuals,
        residual_stddev,
        diagnostics: FitDiagnostics {
            iterations: solution.iterations,
            cost: solution.cost,
            termination: solution.termination,
        },
    })
}
