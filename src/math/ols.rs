//! Damped linear least squares for the Levenberg–Marquardt inner problem.
//!
//! Each solver iteration linearizes the model and needs steps of the form
//!
//! ```text
//! minimize ‖ Ĵ δ̃ - b ‖² + λ ‖ δ̃ ‖²,    Ĵ = W^½ J D⁻¹,  b = W^½ r,  δ = D⁻¹ δ̃
//! ```
//!
//! for several values of `λ` while the trust radius is matched. One SVD
//! `Ĵ = U Σ Vᵀ` answers all of them:
//!
//! ```text
//! δ̃(λ) = V diag(σ / (σ² + λ)) Uᵀ b
//! ```
//!
//! Implementation choices:
//! - SVD rather than normal equations, so nearly collinear columns (a sigmoid
//!   whose plateau is not visible yet) do not square the condition number.
//! - The undamped step (`λ = 0`) drops singular values below a relative cutoff.
//! - Parameter dimension is 3 or 4; the factorization is negligible next to
//!   residual evaluation.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoff for the undamped step.
const RCOND: f64 = 1e-12;

/// Accept a trust-region step whose scaled length is within this fraction of the radius.
const RADIUS_TOLERANCE: f64 = 0.1;

const MAX_RADIUS_ITERATIONS: usize = 200;

/// Factorized damped least-squares system for one solver iteration.
#[derive(Debug, Clone)]
pub struct ScaledSystem {
    v_t: DMatrix<f64>,
    sigma: DVector<f64>,
    u_t_b: DVector<f64>,
    gradient: DVector<f64>,
    residual_norm: f64,
}

impl ScaledSystem {
    /// Build `Ĵ = W^½ J D⁻¹` and `b = W^½ r` and factorize.
    ///
    /// Returns `None` if the scaling is not strictly positive or the SVD is
    /// not finite.
    pub fn new(jacobian: &DMatrix<f64>, residuals: &[f64], weights: &[f64], scale: &[f64]) -> Option<Self> {
        let n = jacobian.nrows();
        let m = jacobian.ncols();
        if scale.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
            return None;
        }

        let mut j_hat = DMatrix::<f64>::zeros(n, m);
        let mut b = DVector::<f64>::zeros(n);
        for i in 0..n {
            let sw = weights[i].sqrt();
            for j in 0..m {
                j_hat[(i, j)] = jacobian[(i, j)] * sw / scale[j];
            }
            b[i] = residuals[i] * sw;
        }

        let gradient = j_hat.transpose() * &b;
        let residual_norm = b.norm();

        let svd = j_hat.svd(true, true);
        let u = svd.u?;
        let v_t = svd.v_t?;
        let sigma = svd.singular_values;
        let u_t_b = u.transpose() * &b;

        let finite = sigma.iter().chain(v_t.iter()).chain(u_t_b.iter()).all(|v| v.is_finite());
        if !finite {
            return None;
        }

        Some(Self {
            v_t,
            sigma,
            u_t_b,
            gradient,
            residual_norm,
        })
    }

    /// Scaled gradient `Ĵᵀ b`.
    pub fn gradient(&self) -> &DVector<f64> {
        &self.gradient
    }

    /// `‖b‖ = ‖W^½ r‖`.
    pub fn residual_norm(&self) -> f64 {
        self.residual_norm
    }

    /// Scaled step `δ̃(λ)`; divide by the column scale for the parameter step.
    pub fn step(&self, lambda: f64) -> DVector<f64> {
        let sigma_max = self.sigma.iter().fold(0.0_f64, |acc, s| acc.max(*s));
        let cutoff = if lambda > 0.0 { 0.0 } else { RCOND * sigma_max };

        let mut out = DVector::<f64>::zeros(self.v_t.ncols());
        for (k, &s) in self.sigma.iter().enumerate() {
            if s <= cutoff {
                continue;
            }
            let coeff = s * self.u_t_b[k] / (s * s + lambda);
            for j in 0..out.len() {
                out[j] += coeff * self.v_t[(k, j)];
            }
        }
        out
    }

    /// Step whose scaled length does not exceed `radius` (up to 10%).
    ///
    /// Returns the undamped step with `λ = 0` when it already fits; otherwise
    /// bisects `λ` until `‖δ̃(λ)‖ ≈ radius`. `‖δ̃(λ)‖ ≤ ‖Ĵᵀb‖ / λ` gives the
    /// upper end of the bracket.
    pub fn trust_region_step(&self, radius: f64) -> (DVector<f64>, f64) {
        let undamped = self.step(0.0);
        if undamped.norm() <= (1.0 + RADIUS_TOLERANCE) * radius {
            return (undamped, 0.0);
        }

        let mut lo = 0.0_f64;
        let mut hi = self.gradient.norm() / radius;
        for _ in 0..MAX_RADIUS_ITERATIONS {
            let mid = if lo == 0.0 { 0.5 * hi } else { (lo * hi).sqrt() };
            let step = self.step(mid);
            let len = step.norm();
            if (len - radius).abs() <= RADIUS_TOLERANCE * radius {
                return (step, mid);
            }
            if len > radius {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        (self.step(hi), hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn undamped_step_solves_least_squares() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = [2.0, 5.0, 8.0];
        let system = ScaledSystem::new(&j, &r, &[1.0; 3], &[1.0, 1.0]).unwrap();

        let delta = system.step(0.0);
        assert_relative_eq!(delta[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(delta[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn damping_shrinks_the_step() {
        let j = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        let system = ScaledSystem::new(&j, &[1.0; 3], &[1.0; 3], &[1.0]).unwrap();

        assert_relative_eq!(system.step(0.0)[0], 1.0, epsilon = 1e-12);
        // (ĴᵀĴ + 3) δ = Ĵᵀb  →  δ = 3 / 6
        assert_relative_eq!(system.step(3.0)[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn steps_are_reported_in_scaled_units() {
        let j = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        let system = ScaledSystem::new(&j, &[1.0; 3], &[1.0; 3], &[2.0]).unwrap();

        // Parameter step is 1; with D = 2 the scaled step is 2.
        assert_relative_eq!(system.step(0.0)[0], 2.0, epsilon = 1e-12);
        assert!(ScaledSystem::new(&j, &[1.0; 3], &[1.0; 3], &[0.0]).is_none());
    }

    #[test]
    fn trust_region_step_respects_the_radius() {
        let j = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        let system = ScaledSystem::new(&j, &[1.0; 3], &[1.0; 3], &[1.0]).unwrap();

        let (free, lambda) = system.trust_region_step(5.0);
        assert_eq!(lambda, 0.0);
        assert_relative_eq!(free[0], 1.0, epsilon = 1e-12);

        let (bounded, lambda) = system.trust_region_step(0.25);
        assert!(lambda > 0.0);
        assert!((bounded.norm() - 0.25).abs() <= 0.025 + 1e-12);
    }
}
