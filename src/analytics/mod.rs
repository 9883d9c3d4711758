//! Analytic quantities derived from fitted (denormalized) parameters.
//!
//! - Sigmoid: inflection point, asymptotes, slope-threshold crossings
//! - Logistic distribution: peak
//!
//! Everything here is closed form; no refitting or numeric root finding.

pub mod points;

pub use points::*;
