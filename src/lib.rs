//! `epi-curves` library crate.
//!
//! Fits parametric growth curves (exponential, sigmoid, logistic-distribution)
//! to daily case-count series and derives inflection points, peaks, asymptotes
//! and slope-threshold crossings from the fitted parameters.
//!
//! The binary (`epi`) is a thin wrapper around this library so that:
//!
//! - the fitting engine is testable without spawning processes
//! - batch callers can fit many series without going through the CLI

pub mod analytics;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
