//! Finalizer for captured solver diagnostics.
//!
//! Runs once after capture completes and computes, in order:
//! 1. Summary statistics over the whole run
//! 2. ML-ready feature sets (convergence, performance, stability, temporal)
//! 3. A data-quality report (completeness, consistency, outliers, readiness)
//!
//! The derived views do not own telemetry; the [`FinalizedStore`] carries
//! them next to a frozen snapshot of the store for export.

pub mod features;
pub mod finalize;
pub mod quality;
pub mod summary;

pub use features::{
    ConvergenceFeatures, MlFeatureSet, PerformanceFeatures, StabilityFeatures, TemporalFeatures,
};
pub use finalize::{finalize, FinalizedStore};
pub use quality::{MlReadiness, QualityReport};
pub use summary::SummaryStatistics;
