//! Mathematical utilities: normalization, linear and nonlinear least squares.

pub mod lm;
pub mod normalize;
pub mod ols;
pub mod stats;

pub use lm::*;
pub use normalize::*;
pub use ols::*;
