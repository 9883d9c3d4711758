//! Error types.
//!
//! - [`FitError`] is returned by the fitting engine and analytics. Each variant
//!   carries enough context (family, attempted parameters, thresholds) for a
//!   batch caller to log the failure and move on to the next series.
//! - [`AppError`] is the CLI-level error: a message plus the process exit code.

use crate::domain::ModelFamily;

/// Which axis of a series failed to normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
        }
    }
}

/// Errors produced by normalization, fitting and analytics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// The values to normalize are constant (or empty), so no affine map exists.
    #[error("Cannot normalize {axis} values: range is degenerate (max == min)")]
    DegenerateRange { axis: Axis },

    /// Fewer observations than free parameters of the family.
    #[error("Insufficient data for {family}: need at least {needed} points, got {got}")]
    InsufficientData {
        family: ModelFamily,
        needed: usize,
        got: usize,
    },

    /// The solver did not converge or produced non-finite parameters.
    #[error("{family} fit did not converge after {iterations} iterations ({reason}); last params {params:?}")]
    FitConvergence {
        family: ModelFamily,
        iterations: usize,
        params: Vec<f64>,
        reason: String,
    },

    /// The requested slope threshold is not attained by the curve.
    #[error("Slope threshold {alpha} is never reached (maximum slope is {max_slope})")]
    NoCrossing { alpha: f64, max_slope: f64 },

    /// Malformed input (length mismatch, non-finite values, bad configuration).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, FitError>;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::InvalidInput(_) => 2,
            FitError::DegenerateRange { .. } | FitError::InsufficientData { .. } => 3,
            FitError::FitConvergence { .. } | FitError::NoCrossing { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_exit_codes() {
        let e: AppError = FitError::InvalidInput("bad".into()).into();
        assert_eq!(e.exit_code(), 2);

        let e: AppError = FitError::InsufficientData {
            family: ModelFamily::Sigmoid,
            needed: 4,
            got: 2,
        }
        .into();
        assert_eq!(e.exit_code(), 3);
        assert!(e.to_string().contains("need at least 4"));

        let e: AppError = FitError::NoCrossing {
            alpha: 10.0,
            max_slope: 1.0,
        }
        .into();
        assert_eq!(e.exit_code(), 4);
    }
}
