//! Reporting utilities: formatted terminal output for fits and batches.

pub mod format;

pub use format::*;
