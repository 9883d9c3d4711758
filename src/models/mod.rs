//! Growth-curve model families.
//!
//! Models are implemented as small, pure functions dispatched on
//! [`ModelFamily`](crate::domain::ModelFamily) so that fitting code can stay generic.

pub mod model;

pub use model::*;
