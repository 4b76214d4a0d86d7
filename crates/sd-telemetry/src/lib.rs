//! Solver diagnostics telemetry capture.
//!
//! This crate provides:
//! - The strongly-shaped [`DiagnosticsStore`] holding all captured telemetry
//!   for a fixed simulation horizon
//! - The Capture API: one ingestion operation per telemetry category,
//!   called inline by the external solver loop
//!
//! The store is created once with known dimensions, mutated exclusively
//! through the Capture API during the run, then frozen by the finalizer.

pub mod capture;
pub mod store;

pub use store::{
    ConvergenceData, DiagnosticsStore, IterationMatrix, LinearSolverData, ModelInfo,
    PerformanceData, ResidualData, StabilityData, StoreMetadata, TimestepControlData,
};

/// Absolute residual change below which consecutive Newton iterations are
/// considered stagnant.
pub const STAGNATION_EPSILON: f64 = 1e-12;
