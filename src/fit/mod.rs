//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit one family to one series (normalize → guess → robust LM → denormalize → dense curve)
//! - fit many independent series/family pairs in parallel

pub mod batch;
pub mod fitter;

pub use batch::*;
pub use fitter::*;
