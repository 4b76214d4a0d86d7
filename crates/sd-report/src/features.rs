//! ML-ready per-timestep feature engineering.
//!
//! Four groups, all vectors of length `total_timesteps`, numeric (flags as
//! 0/1) so downstream tooling can stack them into a feature matrix without
//! further conversion.

use serde::{Deserialize, Serialize};

use sd_math::{
    first_difference, lag, log10_guarded, mean_log10_reduction, moving_average_centered,
    ratio_floored,
};
use sd_telemetry::DiagnosticsStore;

/// Width of the centered moving-average window for temporal features.
const TEMPORAL_WINDOW: usize = 5;

/// Newton convergence behavior per timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceFeatures {
    pub iteration_count: Vec<f64>,
    pub convergence_success: Vec<f64>,
    pub stagnation: Vec<f64>,
    /// Mean of successive log10 residual differences across the nonzero
    /// iteration samples of each timestep.
    pub avg_log10_residual_reduction: Vec<f64>,
    /// `iterations / max(iterations)` over the run.
    pub difficulty_score: Vec<f64>,
}

/// Runtime cost breakdown per timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceFeatures {
    pub total_time: Vec<f64>,
    pub newton_fraction: Vec<f64>,
    pub jacobian_fraction: Vec<f64>,
    pub peak_memory_mb: Vec<f64>,
    pub memory_delta: Vec<f64>,
    pub time_per_iteration: Vec<f64>,
}

/// Numerical stability signals per timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityFeatures {
    pub condition_number: Vec<f64>,
    pub log10_condition_number: Vec<f64>,
    pub near_singular: Vec<f64>,
    pub roundoff_error: Vec<f64>,
    pub backward_error: Vec<f64>,
    pub solution_smoothness: Vec<f64>,
    pub negative_pressures: Vec<f64>,
    pub saturation_violations: Vec<f64>,
    pub unphysical: Vec<f64>,
}

/// Lagged, differenced, and smoothed views for sequence models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    pub iterations_lag1: Vec<f64>,
    pub iterations_lag2: Vec<f64>,
    pub iterations_delta: Vec<f64>,
    pub condition_trend_delta: Vec<f64>,
    pub iterations_moving_avg: Vec<f64>,
    pub dt_moving_avg: Vec<f64>,
}

/// The complete feature set derived at finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlFeatureSet {
    pub convergence: ConvergenceFeatures,
    pub performance: PerformanceFeatures,
    pub stability: StabilityFeatures,
    pub temporal: TemporalFeatures,
}

impl MlFeatureSet {
    /// Number of timesteps the features cover.
    pub fn len(&self) -> usize {
        self.convergence.iteration_count.len()
    }

    pub fn is_empty(&self) -> bool {
        self.convergence.iteration_count.is_empty()
    }
}

/// Derive all four feature groups from a captured store.
pub fn compute_features(store: &DiagnosticsStore) -> MlFeatureSet {
    let t = store.metadata.total_timesteps;

    let iterations: Vec<f64> = store
        .convergence
        .iteration_count
        .iter()
        .map(|v| *v as f64)
        .collect();
    let max_iterations = iterations.iter().copied().fold(0.0, f64::max);

    let mut avg_reduction = Vec::with_capacity(t);
    for ts in 1..=t {
        let row = store.convergence.residual_norm.row(ts);
        let samples: Vec<f64> = row.iter().copied().filter(|v| *v != 0.0).collect();
        avg_reduction.push(mean_log10_reduction(&samples));
    }

    let convergence = ConvergenceFeatures {
        iteration_count: iterations.clone(),
        convergence_success: flags_to_f64(&store.convergence.converged),
        stagnation: flags_to_f64(&store.convergence.stagnation_flag),
        avg_log10_residual_reduction: avg_reduction,
        difficulty_score: iterations
            .iter()
            .map(|v| if max_iterations > 0.0 { v / max_iterations } else { 0.0 })
            .collect(),
    };

    let total_time = &store.performance.total_time;
    let performance = PerformanceFeatures {
        total_time: total_time.clone(),
        newton_fraction: store
            .performance
            .newton_time
            .iter()
            .zip(total_time)
            .map(|(n, tot)| ratio_floored(*n, *tot, 1e-6))
            .collect(),
        jacobian_fraction: store
            .performance
            .jacobian_time
            .iter()
            .zip(total_time)
            .map(|(j, tot)| ratio_floored(*j, *tot, 1e-6))
            .collect(),
        peak_memory_mb: store.performance.memory_mb.clone(),
        memory_delta: first_difference(&store.performance.memory_mb),
        time_per_iteration: total_time
            .iter()
            .zip(&iterations)
            .map(|(tot, it)| tot / it.max(1.0))
            .collect(),
    };

    let condition = &store.stability.condition_trend;
    let stability = StabilityFeatures {
        condition_number: condition.clone(),
        log10_condition_number: condition.iter().map(|v| log10_guarded(*v)).collect(),
        near_singular: flags_to_f64(&store.stability.near_singular),
        roundoff_error: store.stability.roundoff_error.clone(),
        backward_error: store.stability.backward_error.clone(),
        solution_smoothness: store.stability.solution_smoothness.clone(),
        negative_pressures: store
            .stability
            .negative_pressures
            .iter()
            .map(|v| *v as f64)
            .collect(),
        saturation_violations: store
            .stability
            .saturation_violations
            .iter()
            .map(|v| *v as f64)
            .collect(),
        unphysical: flags_to_f64(&store.stability.unphysical),
    };

    let temporal = TemporalFeatures {
        iterations_lag1: lag(&iterations, 1),
        iterations_lag2: lag(&iterations, 2),
        iterations_delta: first_difference(&iterations),
        condition_trend_delta: first_difference(condition),
        iterations_moving_avg: moving_average_centered(&iterations, TEMPORAL_WINDOW),
        dt_moving_avg: moving_average_centered(&store.timestep_control.dt_days, TEMPORAL_WINDOW),
    };

    MlFeatureSet {
        convergence,
        performance,
        stability,
        temporal,
    }
}

fn flags_to_f64(flags: &[bool]) -> Vec<f64> {
    flags.iter().map(|f| if *f { 1.0 } else { 0.0 }).collect()
}
