//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - model selectors and engine settings (`ModelFamily`, `ModelSpec`, `LossKind`, `FitConfig`)
//! - input series (`TimeSeries`)
//! - fit outputs (`ModelParameters`, `FittedModel`, `DerivedPoint`, `CurveFile`)

pub mod types;

pub use types::*;
