//! Telemetry store schema and allocation.
//!
//! Category blocks defined:
//! - `convergence`: Newton iteration counts and residual history
//! - `residuals`: per-equation and global residual norms
//! - `linear_solver`: matrix conditioning and per-iteration solve cost
//! - `timestep_control`: dt selection, cuts, growth, CFL
//! - `performance`: timing breakdown, memory, flop counts
//! - `stability`: conditioning trend, roundoff, unphysical-value signals
//!
//! All arrays are allocated eagerly at creation, dense and zero/false
//! initialized, which bounds memory deterministically for the whole run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sd_common::{Error, Result, RunId, DEFAULT_MAX_ITERATIONS, N_EQUATIONS, SCHEMA_VERSION};

/// Model dimensions supplied by the driver at store creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    pub grid_cells: Option<usize>,
    pub total_wells: Option<usize>,
}

/// Immutable capture-session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub run_id: RunId,
    pub total_timesteps: usize,
    pub grid_cells: usize,
    pub total_wells: usize,
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
    pub max_iterations_per_step: usize,
    pub n_equations: usize,
}

/// Dense row-major timestep-by-iteration matrix with 1-based accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationMatrix {
    data: Vec<f64>,
    timesteps: usize,
    max_iterations: usize,
}

impl IterationMatrix {
    pub fn zeros(timesteps: usize, max_iterations: usize) -> Self {
        IterationMatrix {
            data: vec![0.0; timesteps * max_iterations],
            timesteps,
            max_iterations,
        }
    }

    /// Set cell (t, it), both 1-based. Callers validate bounds.
    pub fn set(&mut self, t: usize, it: usize, value: f64) {
        let idx = (t - 1) * self.max_iterations + (it - 1);
        self.data[idx] = value;
    }

    /// Get cell (t, it), both 1-based.
    pub fn get(&self, t: usize, it: usize) -> f64 {
        self.data[(t - 1) * self.max_iterations + (it - 1)]
    }

    /// Full iteration row for timestep `t` (1-based).
    pub fn row(&self, t: usize) -> &[f64] {
        let start = (t - 1) * self.max_iterations;
        &self.data[start..start + self.max_iterations]
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }
}

/// Newton convergence behavior per timestep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceData {
    pub iteration_count: Vec<u32>,
    pub converged: Vec<bool>,
    pub convergence_rate: Vec<f64>,
    pub stagnation_flag: Vec<bool>,
    pub failure_count: Vec<u32>,
    pub residual_norm: IterationMatrix,
    pub residual_reduction: IterationMatrix,
    pub newton_update_norm: IterationMatrix,
}

/// Per-equation and global residual state per timestep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualData {
    pub equation_residuals: Vec<[f64; N_EQUATIONS]>,
    pub l2_norms: Vec<[f64; N_EQUATIONS]>,
    pub linf_norms: Vec<[f64; N_EQUATIONS]>,
    pub global_l2_norm: Vec<f64>,
    pub global_linf_norm: Vec<f64>,
    pub material_balance_error: Vec<f64>,
    pub cnv_achieved: Vec<bool>,
    pub mb_achieved: Vec<bool>,
    /// `cnv_tolerance - global_linf_norm`, when both were captured.
    pub cnv_margin: Vec<f64>,
    /// `mb_tolerance - material_balance_error`, when both were captured.
    pub mb_margin: Vec<f64>,
}

/// Linear solver conditioning and per-iteration solve cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSolverData {
    /// Worst condition number observed within each timestep.
    pub condition_number: Vec<f64>,
    pub rank_deficiency: Vec<f64>,
    pub sparsity: Vec<f64>,
    pub assembly_time: Vec<f64>,
    pub memory_mb: Vec<f64>,
    pub solve_time: IterationMatrix,
    pub iterations: IterationMatrix,
    pub residual: IterationMatrix,
}

/// Timestep selection and control behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestepControlData {
    pub dt_days: Vec<f64>,
    pub dt_cuts: Vec<u32>,
    /// `dt[t] / dt[t-1]`, computed when `t > 1` and the previous dt > 0.
    pub growth_factor: Vec<f64>,
    pub cfl_number: Vec<f64>,
    pub selection_reason: Vec<Option<String>>,
    pub pressure_change_pa: Vec<Option<f64>>,
    pub max_saturation_change: Vec<Option<f64>>,
    pub stable: Vec<bool>,
    pub oscillating: Vec<bool>,
    pub monotonic: Vec<bool>,
}

/// Timing breakdown and resource usage per timestep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceData {
    pub total_time: Vec<f64>,
    pub newton_time: Vec<f64>,
    pub jacobian_time: Vec<f64>,
    pub residual_eval_time: Vec<f64>,
    pub well_update_time: Vec<f64>,
    pub memory_mb: Vec<f64>,
    pub flops: IterationMatrix,
}

/// Numerical stability signals per timestep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityData {
    pub condition_trend: Vec<f64>,
    pub near_singular: Vec<bool>,
    pub pivot_magnitude: Vec<f64>,
    pub matrix_norm: Vec<f64>,
    /// `matrix_norm[t] / matrix_norm[t-1]` when the previous norm is
    /// nonzero, else the raw current norm.
    pub matrix_norm_ratio: Vec<f64>,
    pub roundoff_error: Vec<f64>,
    pub backward_error: Vec<f64>,
    pub solution_smoothness: Vec<f64>,
    pub negative_pressures: Vec<u32>,
    pub saturation_violations: Vec<u32>,
    pub unphysical: Vec<bool>,
}

/// All captured telemetry for one simulation run.
///
/// Single owner: the capture session. Created with known dimensions,
/// mutated only through the Capture API, frozen by finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsStore {
    pub metadata: StoreMetadata,
    pub convergence: ConvergenceData,
    pub residuals: ResidualData,
    pub linear_solver: LinearSolverData,
    pub timestep_control: TimestepControlData,
    pub performance: PerformanceData,
    pub stability: StabilityData,
    /// Newton iterations dropped for exceeding `max_iterations_per_step`.
    pub dropped_iterations: u64,
    finalized: bool,
}

impl DiagnosticsStore {
    /// Create a store for `total_timesteps` timesteps with the default
    /// iteration cap.
    pub fn create(total_timesteps: usize, model: &ModelInfo) -> Result<Self> {
        Self::create_with_iteration_cap(total_timesteps, model, DEFAULT_MAX_ITERATIONS)
    }

    /// Create a store with an explicit per-timestep iteration cap.
    pub fn create_with_iteration_cap(
        total_timesteps: usize,
        model: &ModelInfo,
        max_iterations: usize,
    ) -> Result<Self> {
        if total_timesteps == 0 {
            return Err(Error::MissingParameter {
                name: "total_timesteps",
            });
        }
        if max_iterations == 0 {
            return Err(Error::MissingParameter {
                name: "max_iterations_per_step",
            });
        }
        let grid_cells = model.grid_cells.ok_or(Error::MissingParameter {
            name: "grid_cells",
        })?;
        if grid_cells == 0 {
            return Err(Error::MissingParameter {
                name: "grid_cells",
            });
        }
        let total_wells = model.total_wells.ok_or(Error::MissingParameter {
            name: "total_wells",
        })?;

        let t = total_timesteps;
        let m = max_iterations;
        let store = DiagnosticsStore {
            metadata: StoreMetadata {
                run_id: RunId::new(),
                total_timesteps: t,
                grid_cells,
                total_wells,
                created_at: Utc::now(),
                schema_version: SCHEMA_VERSION.to_string(),
                max_iterations_per_step: m,
                n_equations: N_EQUATIONS,
            },
            convergence: ConvergenceData {
                iteration_count: vec![0; t],
                converged: vec![false; t],
                convergence_rate: vec![0.0; t],
                stagnation_flag: vec![false; t],
                failure_count: vec![0; t],
                residual_norm: IterationMatrix::zeros(t, m),
                residual_reduction: IterationMatrix::zeros(t, m),
                newton_update_norm: IterationMatrix::zeros(t, m),
            },
            residuals: ResidualData {
                equation_residuals: vec![[0.0; N_EQUATIONS]; t],
                l2_norms: vec![[0.0; N_EQUATIONS]; t],
                linf_norms: vec![[0.0; N_EQUATIONS]; t],
                global_l2_norm: vec![0.0; t],
                global_linf_norm: vec![0.0; t],
                material_balance_error: vec![0.0; t],
                cnv_achieved: vec![false; t],
                mb_achieved: vec![false; t],
                cnv_margin: vec![0.0; t],
                mb_margin: vec![0.0; t],
            },
            linear_solver: LinearSolverData {
                condition_number: vec![0.0; t],
                rank_deficiency: vec![0.0; t],
                sparsity: vec![0.0; t],
                assembly_time: vec![0.0; t],
                memory_mb: vec![0.0; t],
                solve_time: IterationMatrix::zeros(t, m),
                iterations: IterationMatrix::zeros(t, m),
                residual: IterationMatrix::zeros(t, m),
            },
            timestep_control: TimestepControlData {
                dt_days: vec![0.0; t],
                dt_cuts: vec![0; t],
                growth_factor: vec![0.0; t],
                cfl_number: vec![0.0; t],
                selection_reason: vec![None; t],
                pressure_change_pa: vec![None; t],
                max_saturation_change: vec![None; t],
                stable: vec![false; t],
                oscillating: vec![false; t],
                monotonic: vec![false; t],
            },
            performance: PerformanceData {
                total_time: vec![0.0; t],
                newton_time: vec![0.0; t],
                jacobian_time: vec![0.0; t],
                residual_eval_time: vec![0.0; t],
                well_update_time: vec![0.0; t],
                memory_mb: vec![0.0; t],
                flops: IterationMatrix::zeros(t, m),
            },
            stability: StabilityData {
                condition_trend: vec![0.0; t],
                near_singular: vec![false; t],
                pivot_magnitude: vec![0.0; t],
                matrix_norm: vec![0.0; t],
                matrix_norm_ratio: vec![0.0; t],
                roundoff_error: vec![0.0; t],
                backward_error: vec![0.0; t],
                solution_smoothness: vec![0.0; t],
                negative_pressures: vec![0; t],
                saturation_violations: vec![0; t],
                unphysical: vec![false; t],
            },
            dropped_iterations: 0,
            finalized: false,
        };
        tracing::debug!(
            run_id = %store.metadata.run_id,
            total_timesteps = t,
            max_iterations = m,
            approx_bytes = store.estimate_memory(),
            "allocated diagnostics store"
        );
        Ok(store)
    }

    /// Approximate allocated byte count, from dimension products. Lets the
    /// driver estimate footprint before the run starts.
    pub fn estimate_memory(&self) -> usize {
        let t = self.metadata.total_timesteps;
        let f = std::mem::size_of::<f64>();
        let matrices = self.convergence.residual_norm.bytes()
            + self.convergence.residual_reduction.bytes()
            + self.convergence.newton_update_norm.bytes()
            + self.linear_solver.solve_time.bytes()
            + self.linear_solver.iterations.bytes()
            + self.linear_solver.residual.bytes()
            + self.performance.flops.bytes();
        // Per-timestep scalar arrays across all categories, sized as f64.
        let scalar_arrays = 36;
        let per_equation = 3 * t * N_EQUATIONS * f;
        matrices + scalar_arrays * t * f + per_equation
    }

    /// True once the finalizer has frozen this store.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Freeze the store. Fails if already frozen.
    pub fn mark_finalized(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        self.finalized = true;
        Ok(())
    }

    /// Validate a 1-based timestep index and return it zero-based.
    pub(crate) fn check_timestep(&self, t: usize) -> Result<usize> {
        if t == 0 || t > self.metadata.total_timesteps {
            return Err(Error::IndexOutOfRange {
                what: "timestep_index",
                index: t,
                max: self.metadata.total_timesteps,
            });
        }
        Ok(t - 1)
    }

    /// Reject capture into a frozen store.
    pub(crate) fn check_open(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelInfo {
        ModelInfo {
            grid_cells: Some(1000),
            total_wells: Some(4),
        }
    }

    #[test]
    fn test_create_allocates_full_shape() {
        let store = DiagnosticsStore::create(10, &model()).unwrap();
        assert_eq!(store.metadata.total_timesteps, 10);
        assert_eq!(store.metadata.max_iterations_per_step, 50);
        assert_eq!(store.convergence.iteration_count.len(), 10);
        assert_eq!(store.convergence.residual_norm.timesteps(), 10);
        assert_eq!(store.convergence.residual_norm.max_iterations(), 50);
        assert_eq!(store.residuals.equation_residuals.len(), 10);
        assert_eq!(store.stability.unphysical.len(), 10);
        assert_eq!(store.performance.flops.row(1).len(), 50);
    }

    #[test]
    fn test_create_rejects_zero_timesteps() {
        let err = DiagnosticsStore::create(0, &model()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingParameter {
                name: "total_timesteps"
            }
        ));
    }

    #[test]
    fn test_create_requires_model_dimensions() {
        let missing_cells = ModelInfo {
            grid_cells: None,
            total_wells: Some(2),
        };
        assert!(matches!(
            DiagnosticsStore::create(5, &missing_cells).unwrap_err(),
            Error::MissingParameter { name: "grid_cells" }
        ));

        let missing_wells = ModelInfo {
            grid_cells: Some(100),
            total_wells: None,
        };
        assert!(matches!(
            DiagnosticsStore::create(5, &missing_wells).unwrap_err(),
            Error::MissingParameter { name: "total_wells" }
        ));
    }

    #[test]
    fn test_estimate_memory_scales_with_dimensions() {
        let small = DiagnosticsStore::create(10, &model()).unwrap();
        let large = DiagnosticsStore::create(1000, &model()).unwrap();
        assert!(large.estimate_memory() > 50 * small.estimate_memory());
        // 7 matrices dominate: 1000 * 50 * 8 bytes each.
        assert!(large.estimate_memory() >= 7 * 1000 * 50 * 8);
    }

    #[test]
    fn test_iteration_matrix_accessors() {
        let mut m = IterationMatrix::zeros(3, 4);
        m.set(2, 3, 7.5);
        assert_eq!(m.get(2, 3), 7.5);
        assert_eq!(m.row(2), &[0.0, 0.0, 7.5, 0.0]);
        assert_eq!(m.row(1), &[0.0; 4]);
    }

    #[test]
    fn test_mark_finalized_once() {
        let mut store = DiagnosticsStore::create(3, &model()).unwrap();
        assert!(!store.is_finalized());
        store.mark_finalized().unwrap();
        assert!(store.is_finalized());
        assert!(matches!(
            store.mark_finalized().unwrap_err(),
            Error::AlreadyFinalized
        ));
    }

    #[test]
    fn test_check_timestep_bounds() {
        let store = DiagnosticsStore::create(10, &model()).unwrap();
        assert_eq!(store.check_timestep(1).unwrap(), 0);
        assert_eq!(store.check_timestep(10).unwrap(), 9);
        assert!(store.check_timestep(0).is_err());
        assert!(matches!(
            store.check_timestep(11).unwrap_err(),
            Error::IndexOutOfRange { index: 11, max: 10, .. }
        ));
    }
}
