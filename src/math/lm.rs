//! Robust Levenberg–Marquardt solver.
//!
//! Minimizes
//!
//! ```text
//! C(p) = ½ s² Σ ρ((r_i(p) / s)²),    r_i = y_i - f(p, x_i)
//! ```
//!
//! where `ρ` is the configured loss (`linear`, `soft-l1`, `huber`) and `s` the
//! loss scale. Every iteration linearizes `f`, weights each row by `ρ'(z_i)`
//! (iteratively reweighted least squares) and takes a step inside a trust
//! region measured in column-scaled units `‖D δ‖ ≤ Δ`, as MINPACK's `lmder`
//! does:
//!
//! - `D` holds the running maximum of the weighted Jacobian column norms.
//! - `Δ` starts at `STEP_BOUND_FACTOR · ‖D p0‖` and is capped by the first
//!   step, so the first iterations cannot throw a sigmoid into saturation.
//! - The ratio of actual to predicted cost reduction grows or shrinks `Δ`.
//!
//! The solver is deterministic: same inputs, same iterates.

use log::{debug, trace};
use nalgebra::DMatrix;

use crate::domain::{LossKind, Termination};
use crate::math::ols::ScaledSystem;

/// Initial trust radius relative to `‖D p0‖`.
const STEP_BOUND_FACTOR: f64 = 10.0;

/// Minimum ratio of actual to predicted reduction for a step to be accepted.
const ACCEPT_RATIO: f64 = 1e-4;

/// A nonlinear least-squares problem `r(p) = y - f(p, x)`.
pub trait LeastSquaresProblem {
    fn n_params(&self) -> usize;

    fn n_obs(&self) -> usize;

    /// Fill `out[i] = y_i - f(p, x_i)`.
    fn residuals(&self, p: &[f64], out: &mut [f64]);

    /// Fill `out[(i, j)] = ∂f(p, x_i)/∂p_j` (the model Jacobian, not the residual one).
    fn model_jacobian(&self, p: &[f64], out: &mut DMatrix<f64>);
}

#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    pub loss: LossKind,
    pub loss_scale: f64,
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Why the solver gave up; carries the last accepted iterate.
#[derive(Debug, Clone)]
pub struct SolverFailure {
    pub params: Vec<f64>,
    pub iterations: usize,
    pub reason: String,
}

/// `ρ(z)` for `z = (r/s)²`.
pub fn loss_rho(loss: LossKind, z: f64) -> f64 {
    match loss {
        LossKind::Linear => z,
        LossKind::SoftL1 => 2.0 * ((1.0 + z).sqrt() - 1.0),
        LossKind::Huber => {
            if z <= 1.0 {
                z
            } else {
                2.0 * z.sqrt() - 1.0
            }
        }
    }
}

/// `ρ'(z)`, used as the IRLS row weight.
pub fn loss_weight(loss: LossKind, z: f64) -> f64 {
    match loss {
        LossKind::Linear => 1.0,
        LossKind::SoftL1 => 1.0 / (1.0 + z).sqrt(),
        LossKind::Huber => {
            if z <= 1.0 {
                1.0
            } else {
                1.0 / z.sqrt()
            }
        }
    }
}

fn robust_cost(loss: LossKind, scale: f64, residuals: &[f64]) -> f64 {
    let s2 = scale * scale;
    0.5 * s2 * residuals.iter().map(|r| loss_rho(loss, r * r / s2)).sum::<f64>()
}

fn scaled_norm(scale: &[f64], p: &[f64]) -> f64 {
    scale.iter().zip(p).map(|(d, v)| (d * v) * (d * v)).sum::<f64>().sqrt()
}

/// Run Levenberg–Marquardt from `p0`.
pub fn solve<P: LeastSquaresProblem>(
    problem: &P,
    p0: &[f64],
    opts: &SolverOptions,
) -> Result<Solution, SolverFailure> {
    let n = problem.n_obs();
    let m = problem.n_params();
    let s2 = opts.loss_scale * opts.loss_scale;

    let fail = |params: &[f64], iterations: usize, reason: &str| SolverFailure {
        params: params.to_vec(),
        iterations,
        reason: reason.to_string(),
    };

    let mut p = p0.to_vec();
    let mut r = vec![0.0; n];
    problem.residuals(&p, &mut r);
    if r.iter().any(|v| !v.is_finite()) {
        return Err(fail(&p, 0, "non-finite residuals at initial guess"));
    }
    let mut cost = robust_cost(opts.loss, opts.loss_scale, &r);

    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut r_new = vec![0.0; n];
    let mut w = vec![0.0; n];
    let mut scale = vec![1.0; m];
    let mut radius = 0.0;

    for iter in 1..=opts.max_iterations {
        if cost == 0.0 {
            return Ok(finish(p, cost, iter, Termination::Ftol));
        }

        problem.model_jacobian(&p, &mut jac);
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(fail(&p, iter, "non-finite Jacobian"));
        }

        for (wi, ri) in w.iter_mut().zip(r.iter()) {
            *wi = loss_weight(opts.loss, ri * ri / s2);
        }

        let col_norms: Vec<f64> = (0..m)
            .map(|j| (0..n).map(|i| w[i] * jac[(i, j)] * jac[(i, j)]).sum::<f64>().sqrt())
            .collect();
        if iter == 1 {
            for (d, &c) in scale.iter_mut().zip(&col_norms) {
                *d = if c > 0.0 { c } else { 1.0 };
            }
            let p_norm = scaled_norm(&scale, &p);
            radius = if p_norm > 0.0 {
                STEP_BOUND_FACTOR * p_norm
            } else {
                STEP_BOUND_FACTOR
            };
        } else {
            for (d, &c) in scale.iter_mut().zip(&col_norms) {
                *d = d.max(c);
            }
        }

        let Some(system) = ScaledSystem::new(&jac, &r, &w, &scale) else {
            return Err(fail(&p, iter, "linearized system could not be factorized"));
        };

        // Largest cosine between the weighted residual and a Jacobian column.
        let b_norm = system.residual_norm();
        let g_max = if b_norm > 0.0 {
            (0..m)
                .filter(|&j| col_norms[j] > 0.0)
                .map(|j| (system.gradient()[j] * scale[j]).abs() / (col_norms[j] * b_norm))
                .fold(0.0_f64, f64::max)
        } else {
            0.0
        };
        if g_max <= opts.gtol {
            return Ok(finish(p, cost, iter, Termination::Gtol));
        }

        loop {
            let (scaled_step, lambda) = system.trust_region_step(radius);
            let step_norm = scaled_step.norm();
            let step: Vec<f64> = scaled_step.iter().zip(&scale).map(|(v, d)| v / d).collect();
            if iter == 1 {
                radius = radius.min(step_norm);
            }

            let p_new: Vec<f64> = p.iter().zip(&step).map(|(a, b)| a + b).collect();
            problem.residuals(&p_new, &mut r_new);
            let cost_new = if r_new.iter().all(|v| v.is_finite()) {
                robust_cost(opts.loss, opts.loss_scale, &r_new)
            } else {
                f64::INFINITY
            };

            // Reduction predicted by the reweighted quadratic model.
            let predicted = 0.5
                * (0..n)
                    .map(|i| {
                        let jd: f64 = (0..m).map(|j| jac[(i, j)] * step[j]).sum();
                        w[i] * (r[i] * r[i] - (r[i] - jd) * (r[i] - jd))
                    })
                    .sum::<f64>();
            let actual = cost - cost_new;
            let ratio = if predicted > 0.0 && actual.is_finite() {
                actual / predicted
            } else {
                0.0
            };

            if ratio < 0.25 {
                radius = 0.5 * radius.min(step_norm);
            } else if lambda == 0.0 || ratio >= 0.75 {
                radius = 2.0 * step_norm;
            }

            let prev_cost = cost;
            let accepted = ratio >= ACCEPT_RATIO;
            if accepted {
                p = p_new;
                std::mem::swap(&mut r, &mut r_new);
                cost = cost_new;
                trace!("lm iter={iter} cost={cost:.6e} lambda={lambda:.1e} radius={radius:.3e}");
            }

            if actual.abs() <= opts.ftol * prev_cost && predicted <= opts.ftol * prev_cost && ratio <= 2.0 {
                return Ok(finish(p, cost, iter, Termination::Ftol));
            }
            if radius <= opts.xtol * scaled_norm(&scale, &p) {
                return Ok(finish(p, cost, iter, Termination::Xtol));
            }
            if accepted {
                break;
            }
            if radius <= 0.0 || !radius.is_finite() {
                return Err(fail(&p, iter, "trust region collapsed without reducing cost"));
            }
        }
    }

    Err(fail(&p, opts.max_iterations, "maximum iterations reached"))
}

fn finish(params: Vec<f64>, cost: f64, iterations: usize, termination: Termination) -> Solution {
    debug!("lm converged: iterations={iterations} cost={cost:.6e} termination={termination:?}");
    Solution {
        params,
        cost,
        iterations,
        termination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `f(p, x) = p0 + p1 * x`
    struct Line<'a> {
        x: &'a [f64],
        y: &'a [f64],
    }

    impl LeastSquaresProblem for Line<'_> {
        fn n_params(&self) -> usize {
            2
        }
        fn n_obs(&self) -> usize {
            self.x.len()
        }
        fn residuals(&self, p: &[f64], out: &mut [f64]) {
            for i in 0..self.x.len() {
                out[i] = self.y[i] - (p[0] + p[1] * self.x[i]);
            }
        }
        fn model_jacobian(&self, _p: &[f64], out: &mut DMatrix<f64>) {
            for i in 0..self.x.len() {
                out[(i, 0)] = 1.0;
                out[(i, 1)] = self.x[i];
            }
        }
    }

    /// `f(p, x) = exp(p0 * x)`
    struct Growth<'a> {
        x: &'a [f64],
        y: &'a [f64],
    }

    impl LeastSquaresProblem for Growth<'_> {
        fn n_params(&self) -> usize {
            1
        }
        fn n_obs(&self) -> usize {
            self.x.len()
        }
        fn residuals(&self, p: &[f64], out: &mut [f64]) {
            for i in 0..self.x.len() {
                out[i] = self.y[i] - (p[0] * self.x[i]).exp();
            }
        }
        fn model_jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) {
            for i in 0..self.x.len() {
                out[(i, 0)] = self.x[i] * (p[0] * self.x[i]).exp();
            }
        }
    }

    fn opts(loss: LossKind) -> SolverOptions {
        SolverOptions {
            loss,
            loss_scale: 0.1,
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-10,
            gtol: 1e-12,
        }
    }

    #[test]
    fn recovers_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let sol = solve(&Line { x: &x, y: &y }, &[0.0, 0.0], &opts(LossKind::Linear)).unwrap();
        assert!((sol.params[0] - 1.0).abs() < 1e-8);
        assert!((sol.params[1] - 2.0).abs() < 1e-8);
        assert!(sol.cost < 1e-16);
    }

    #[test]
    fn recovers_exponential_rate() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| (1.7 * v).exp()).collect();
        let sol = solve(&Growth { x: &x, y: &y }, &[0.2], &opts(LossKind::SoftL1)).unwrap();
        assert!((sol.params[0] - 1.7).abs() < 1e-7, "got {}", sol.params[0]);
    }

    #[test]
    fn soft_l1_downweights_outlier() {
        // Constant model; the single outlier drags the OLS mean.
        let y = [1.0, 1.0, 1.0, 1.0, 10.0];

        struct Constant<'a>(&'a [f64]);
        impl LeastSquaresProblem for Constant<'_> {
            fn n_params(&self) -> usize {
                1
            }
            fn n_obs(&self) -> usize {
                self.0.len()
            }
            fn residuals(&self, p: &[f64], out: &mut [f64]) {
                for (o, y) in out.iter_mut().zip(self.0.iter()) {
                    *o = y - p[0];
                }
            }
            fn model_jacobian(&self, _p: &[f64], out: &mut DMatrix<f64>) {
                out.fill(1.0);
            }
        }

        let ols = solve(&Constant(&y), &[0.0], &opts(LossKind::Linear)).unwrap();
        let robust = solve(&Constant(&y), &[0.0], &opts(LossKind::SoftL1)).unwrap();
        assert!((ols.params[0] - 2.8).abs() < 1e-6);
        assert!(robust.params[0] < 1.1, "robust estimate {}", robust.params[0]);
        assert!(robust.params[0] > 1.0);
    }

    #[test]
    fn reports_failure_when_iterations_run_out() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| (1.7 * v).exp()).collect();
        let mut o = opts(LossKind::Linear);
        o.max_iterations = 1;
        o.ftol = 0.0;
        o.xtol = 0.0;
        o.gtol = 0.0;
        let err = solve(&Growth { x: &x, y: &y }, &[-3.0], &o).unwrap_err();
        assert_eq!(err.iterations, 1);
        assert!(err.reason.contains("maximum iterations"));
    }

    #[test]
    fn loss_weights_are_bounded_by_one() {
        for loss in [LossKind::Linear, LossKind::SoftL1, LossKind::Huber] {
            for z in [0.0, 0.5, 1.0, 4.0, 100.0] {
                let w = loss_weight(loss, z);
                assert!(w > 0.0 && w <= 1.0);
            }
        }
        assert_eq!(loss_rho(LossKind::Huber, 4.0), 3.0);
        assert!((loss_rho(LossKind::SoftL1, 3.0) - 2.0).abs() < 1e-12);
    }
}
