//! Run-level summary statistics.

use serde::{Deserialize, Serialize};

use sd_telemetry::DiagnosticsStore;

/// Aggregates over the whole run, computed once at finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total_newton_iterations: u64,
    pub avg_newton_iterations: f64,
    pub max_newton_iterations: u32,
    /// `count(converged) / total_timesteps`.
    pub convergence_success_rate: f64,
    pub total_simulation_time: f64,
    pub avg_timestep_time: f64,
    pub peak_memory_mb: f64,
    pub worst_condition_number: f64,
    /// `count(near_singular) + count(unphysical)`.
    pub stability_issue_count: u64,
}

/// Compute summary statistics from a captured store.
pub fn compute_summary(store: &DiagnosticsStore) -> SummaryStatistics {
    let t = store.metadata.total_timesteps;
    let iters = &store.convergence.iteration_count;

    let total_newton: u64 = iters.iter().map(|v| *v as u64).sum();
    let max_newton = iters.iter().copied().max().unwrap_or(0);

    let converged = store.convergence.converged.iter().filter(|c| **c).count();
    let total_time: f64 = store.performance.total_time.iter().sum();

    let peak_memory = store
        .performance
        .memory_mb
        .iter()
        .copied()
        .fold(0.0, f64::max);

    // Either capture path may be the only one populated.
    let worst_condition = store
        .linear_solver
        .condition_number
        .iter()
        .chain(store.stability.condition_trend.iter())
        .copied()
        .fold(0.0, f64::max);

    let near_singular = store.stability.near_singular.iter().filter(|v| **v).count();
    let unphysical = store.stability.unphysical.iter().filter(|v| **v).count();

    SummaryStatistics {
        total_newton_iterations: total_newton,
        avg_newton_iterations: total_newton as f64 / t as f64,
        max_newton_iterations: max_newton,
        convergence_success_rate: converged as f64 / t as f64,
        total_simulation_time: total_time,
        avg_timestep_time: total_time / t as f64,
        peak_memory_mb: peak_memory,
        worst_condition_number: worst_condition,
        stability_issue_count: (near_singular + unphysical) as u64,
    }
}
