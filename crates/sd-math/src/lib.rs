//! Statistics primitives for solver diagnostics.

pub mod stats;

pub use stats::*;
