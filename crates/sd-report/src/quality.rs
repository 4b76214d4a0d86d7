//! Data-quality scoring for captured telemetry.
//!
//! Quality problems are signals, not errors: a run that never populated a
//! category still finalizes, and the report tells downstream consumers how
//! much to trust the data.

use serde::{Deserialize, Serialize};
use tracing::warn;

use sd_math::tukey_outlier_count;
use sd_telemetry::DiagnosticsStore;

use crate::features::MlFeatureSet;

/// Fraction of entries that must be non-NaN and nonzero for an array to
/// count as populated.
const POPULATED_THRESHOLD: f64 = 0.8;

/// Minimum run length for ML-readiness.
const MIN_TIMESTEPS_FOR_ML: usize = 20;

/// ML-readiness verdict from the 5-point rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MlReadiness {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl MlReadiness {
    fn from_criteria(met: u8) -> Self {
        match met {
            4.. => MlReadiness::Excellent,
            3 => MlReadiness::Good,
            2 => MlReadiness::Fair,
            _ => MlReadiness::Poor,
        }
    }
}

impl std::fmt::Display for MlReadiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MlReadiness::Excellent => write!(f, "excellent"),
            MlReadiness::Good => write!(f, "good"),
            MlReadiness::Fair => write!(f, "fair"),
            MlReadiness::Poor => write!(f, "poor"),
        }
    }
}

/// Quality assessment of a captured run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// `100 × populated / checked` over the core per-timestep arrays.
    pub completeness_pct: f64,
    pub arrays_checked: usize,
    pub arrays_populated: usize,
    pub length_consistent: bool,
    /// False when many high-iteration timesteps claim convergence.
    pub logical_consistent: bool,
    pub consistency_passed: bool,
    pub issues: Vec<String>,
    pub iteration_outliers: usize,
    pub dt_outliers: usize,
    pub outlier_fraction: f64,
    /// Newton iterations dropped for exceeding the per-step cap.
    pub dropped_iterations: u64,
    pub criteria_met: u8,
    pub readiness: MlReadiness,
}

/// Assess completeness, consistency, outliers, and ML readiness.
pub fn assess_quality(store: &DiagnosticsStore, features: &MlFeatureSet) -> QualityReport {
    let t = store.metadata.total_timesteps;
    let mut issues = Vec::new();

    // Completeness over the core per-timestep arrays.
    let iterations: Vec<f64> = store
        .convergence
        .iteration_count
        .iter()
        .map(|v| *v as f64)
        .collect();
    let core_arrays: [(&str, &[f64]); 8] = [
        ("convergence.iteration_count", &iterations),
        ("timestep_control.dt_days", &store.timestep_control.dt_days),
        ("timestep_control.cfl_number", &store.timestep_control.cfl_number),
        ("performance.total_time", &store.performance.total_time),
        ("performance.newton_time", &store.performance.newton_time),
        ("performance.memory_mb", &store.performance.memory_mb),
        ("stability.condition_trend", &store.stability.condition_trend),
        ("residuals.global_l2_norm", &store.residuals.global_l2_norm),
    ];
    let mut populated = 0usize;
    for (name, arr) in &core_arrays {
        if is_populated(arr) {
            populated += 1;
        } else {
            issues.push(format!("array '{name}' is sparsely populated"));
        }
    }
    let completeness_pct = 100.0 * populated as f64 / core_arrays.len() as f64;

    // Structural length check over every per-timestep array.
    let length_consistent = per_timestep_lengths(store).iter().all(|len| *len == t);
    if !length_consistent {
        issues.push("per-timestep array length mismatch".to_string());
    }

    // Heuristic sanity check: timesteps that needed many iterations should
    // rarely be marked converged.
    let hard_steps: Vec<usize> = store
        .convergence
        .iteration_count
        .iter()
        .enumerate()
        .filter(|(_, it)| **it > 20)
        .map(|(i, _)| i)
        .collect();
    let hard_converged = hard_steps
        .iter()
        .filter(|i| store.convergence.converged[**i])
        .count();
    let logical_consistent =
        hard_steps.is_empty() || (hard_converged as f64) <= 0.1 * hard_steps.len() as f64;
    if !logical_consistent {
        issues.push(format!(
            "{hard_converged} of {} high-iteration timesteps marked converged",
            hard_steps.len()
        ));
    }
    let consistency_passed = length_consistent && logical_consistent;

    // Tukey-fence outliers on iteration counts and positive dt samples.
    let iteration_outliers = tukey_outlier_count(&iterations);
    let positive_dt: Vec<f64> = store
        .timestep_control
        .dt_days
        .iter()
        .copied()
        .filter(|dt| *dt > 0.0)
        .collect();
    let dt_outliers = tukey_outlier_count(&positive_dt);
    let examined = iterations.len() + positive_dt.len();
    let outlier_fraction = if examined > 0 {
        (iteration_outliers + dt_outliers) as f64 / examined as f64
    } else {
        0.0
    };

    let criteria = [
        completeness_pct > 90.0,
        consistency_passed,
        !features.is_empty(),
        t >= MIN_TIMESTEPS_FOR_ML,
        outlier_fraction < 0.05,
    ];
    let criteria_met = criteria.iter().filter(|c| **c).count() as u8;
    let readiness = MlReadiness::from_criteria(criteria_met);

    if readiness == MlReadiness::Poor {
        warn!(
            completeness = completeness_pct,
            criteria_met, "captured telemetry is poorly suited for ML use"
        );
    }

    QualityReport {
        completeness_pct,
        arrays_checked: core_arrays.len(),
        arrays_populated: populated,
        length_consistent,
        logical_consistent,
        consistency_passed,
        issues,
        iteration_outliers,
        dt_outliers,
        outlier_fraction,
        dropped_iterations: store.dropped_iterations,
        criteria_met,
        readiness,
    }
}

fn is_populated(values: &[f64]) -> bool {
    if values.is_empty() {
        return false;
    }
    let good = values.iter().filter(|v| !v.is_nan() && **v != 0.0).count();
    good as f64 > POPULATED_THRESHOLD * values.len() as f64
}

fn per_timestep_lengths(store: &DiagnosticsStore) -> Vec<usize> {
    vec![
        store.convergence.iteration_count.len(),
        store.convergence.converged.len(),
        store.convergence.convergence_rate.len(),
        store.convergence.stagnation_flag.len(),
        store.convergence.failure_count.len(),
        store.residuals.equation_residuals.len(),
        store.residuals.global_l2_norm.len(),
        store.residuals.global_linf_norm.len(),
        store.residuals.material_balance_error.len(),
        store.linear_solver.condition_number.len(),
        store.linear_solver.assembly_time.len(),
        store.timestep_control.dt_days.len(),
        store.timestep_control.growth_factor.len(),
        store.timestep_control.selection_reason.len(),
        store.performance.total_time.len(),
        store.performance.memory_mb.len(),
        store.stability.condition_trend.len(),
        store.stability.matrix_norm_ratio.len(),
        store.stability.unphysical.len(),
    ]
}
