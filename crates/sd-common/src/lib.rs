//! Shared types for the solver diagnostics pipeline.
//!
//! This crate provides:
//! - The error taxonomy used across capture, finalize, and export
//! - Run identity (`RunId`)
//! - Typed input records matching the external solver driver's contract

pub mod error;
pub mod id;
pub mod records;

pub use error::{Error, Result};
pub use id::RunId;
pub use records::{
    ConvergenceCheck, LinearSolveInfo, NewtonRecord, ResidualRecord, StabilityRecord,
    TimestepRecord,
};

/// Schema version for captured telemetry and exported artifacts.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Iteration cap for per-iteration matrices. Newton iterations beyond this
/// bound are dropped and counted, never silently truncated without signal.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Number of conserved-phase equations tracked per timestep.
pub const N_EQUATIONS: usize = 3;

/// Condition numbers above this are flagged as near-singular.
pub const NEAR_SINGULAR_THRESHOLD: f64 = 1e12;
