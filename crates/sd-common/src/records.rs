//! Input record contract for the external solver driver.
//!
//! Four record shapes, delivered once per Newton iteration or once per
//! timestep. Required fields are plain values and enforced by the type;
//! optional fields default explicitly via `Option` instead of runtime
//! field-existence probing.
//!
//! Drivers that hand over loosely-typed maps (JSON-ish key/value records)
//! use the `from_value` constructors, which fail with
//! [`Error::MissingRequiredField`] when a category-defining field is absent
//! and silently skip unrecognized keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One Newton iteration of the nonlinear solver within a timestep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewtonRecord {
    /// 1-based iteration number within the timestep. Required.
    pub iteration_number: u32,
    pub residual_norm: Option<f64>,
    pub residual_reduction: Option<f64>,
    pub newton_update_norm: Option<f64>,
    /// Floating-point operation count for this iteration.
    pub flop_count: Option<f64>,
    pub linear_solve: Option<LinearSolveInfo>,
    pub convergence: Option<ConvergenceCheck>,
}

/// Linear solver performance for one Newton iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearSolveInfo {
    pub solve_time: Option<f64>,
    pub linear_iterations: Option<u32>,
    pub linear_residual: Option<f64>,
    pub condition_number: Option<f64>,
    pub rank_deficiency: Option<f64>,
    pub sparsity: Option<f64>,
    pub assembly_time: Option<f64>,
    pub memory_mb: Option<f64>,
}

/// Outcome of the convergence check at one Newton iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvergenceCheck {
    pub converged: bool,
    pub cnv_satisfied: Option<bool>,
    pub mb_satisfied: Option<bool>,
}

/// Timestep control and timing breakdown, delivered once per timestep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimestepRecord {
    /// Timestep length in days. Required.
    pub dt_days: f64,
    pub dt_cuts: Option<u32>,
    pub cfl_number: Option<f64>,
    pub selection_reason: Option<String>,
    pub pressure_change_pa: Option<f64>,
    pub max_saturation_change: Option<f64>,
    pub total_timestep_time: Option<f64>,
    pub peak_memory_mb: Option<f64>,
    pub newton_time: Option<f64>,
    pub jacobian_time: Option<f64>,
    pub residual_eval_time: Option<f64>,
    pub well_update_time: Option<f64>,
}

/// Per-equation residual state at the end of a timestep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResidualRecord {
    pub equation_residuals: Option<[f64; crate::N_EQUATIONS]>,
    pub l2_norms: Option<[f64; crate::N_EQUATIONS]>,
    pub linf_norms: Option<[f64; crate::N_EQUATIONS]>,
    pub global_l2_norm: Option<f64>,
    pub global_linf_norm: Option<f64>,
    pub material_balance_error: Option<f64>,
    pub cnv_tolerance: Option<f64>,
    pub mb_tolerance: Option<f64>,
    pub cnv_achieved: Option<bool>,
    pub mb_achieved: Option<bool>,
}

/// Numerical stability indicators, delivered once per timestep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StabilityRecord {
    pub condition_number: Option<f64>,
    pub pivot_magnitude: Option<f64>,
    pub matrix_norm: Option<f64>,
    pub roundoff_error_estimate: Option<f64>,
    pub backward_error: Option<f64>,
    pub solution_smoothness: Option<f64>,
    pub negative_pressures: Option<u32>,
    pub saturation_violations: Option<u32>,
    pub unphysical_detected: Option<bool>,
}

fn get_f64(map: &Value, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

fn get_u32(map: &Value, key: &str) -> Option<u32> {
    map.get(key).and_then(Value::as_u64).map(|v| v as u32)
}

fn get_bool(map: &Value, key: &str) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}

fn get_string(map: &Value, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_f64_array(map: &Value, key: &str) -> Option<[f64; crate::N_EQUATIONS]> {
    let arr = map.get(key)?.as_array()?;
    if arr.len() != crate::N_EQUATIONS {
        return None;
    }
    let mut out = [0.0; crate::N_EQUATIONS];
    for (slot, v) in out.iter_mut().zip(arr) {
        *slot = v.as_f64()?;
    }
    Some(out)
}

impl NewtonRecord {
    /// Parse from a loosely-typed map. `iteration_number` is required.
    pub fn from_value(map: &Value) -> Result<Self> {
        let iteration_number =
            get_u32(map, "iteration_number").ok_or(Error::MissingRequiredField {
                record: "newton",
                field: "iteration_number",
            })?;
        let linear_solve = map.get("linear_solve_info").map(|info| LinearSolveInfo {
            solve_time: get_f64(info, "solve_time"),
            linear_iterations: get_u32(info, "linear_iterations"),
            linear_residual: get_f64(info, "linear_residual"),
            condition_number: get_f64(info, "condition_number"),
            rank_deficiency: get_f64(info, "rank_deficiency"),
            sparsity: get_f64(info, "sparsity"),
            assembly_time: get_f64(info, "assembly_time"),
            memory_mb: get_f64(info, "memory_mb"),
        });
        let convergence = map.get("convergence_check").map(|chk| ConvergenceCheck {
            converged: get_bool(chk, "converged").unwrap_or(false),
            cnv_satisfied: get_bool(chk, "cnv_satisfied"),
            mb_satisfied: get_bool(chk, "mb_satisfied"),
        });
        Ok(NewtonRecord {
            iteration_number,
            residual_norm: get_f64(map, "residual_norm"),
            residual_reduction: get_f64(map, "residual_reduction"),
            newton_update_norm: get_f64(map, "newton_update_norm"),
            flop_count: get_f64(map, "flop_count"),
            linear_solve,
            convergence,
        })
    }
}

impl TimestepRecord {
    /// Parse from a loosely-typed map. `dt_days` is required.
    pub fn from_value(map: &Value) -> Result<Self> {
        let dt_days = get_f64(map, "dt_days").ok_or(Error::MissingRequiredField {
            record: "timestep",
            field: "dt_days",
        })?;
        Ok(TimestepRecord {
            dt_days,
            dt_cuts: get_u32(map, "dt_cuts"),
            cfl_number: get_f64(map, "cfl_number"),
            selection_reason: get_string(map, "selection_reason"),
            pressure_change_pa: get_f64(map, "pressure_change_pa"),
            max_saturation_change: get_f64(map, "max_saturation_change"),
            total_timestep_time: get_f64(map, "total_timestep_time"),
            peak_memory_mb: get_f64(map, "peak_memory_mb"),
            newton_time: get_f64(map, "newton_time"),
            jacobian_time: get_f64(map, "jacobian_time"),
            residual_eval_time: get_f64(map, "residual_eval_time"),
            well_update_time: get_f64(map, "well_update_time"),
        })
    }
}

impl ResidualRecord {
    /// Parse from a loosely-typed map. All fields are optional.
    pub fn from_value(map: &Value) -> Result<Self> {
        Ok(ResidualRecord {
            equation_residuals: get_f64_array(map, "equation_residuals"),
            l2_norms: get_f64_array(map, "l2_norms"),
            linf_norms: get_f64_array(map, "linf_norms"),
            global_l2_norm: get_f64(map, "global_l2_norm"),
            global_linf_norm: get_f64(map, "global_linf_norm"),
            material_balance_error: get_f64(map, "material_balance_error"),
            cnv_tolerance: get_f64(map, "cnv_tolerance"),
            mb_tolerance: get_f64(map, "mb_tolerance"),
            cnv_achieved: get_bool(map, "cnv_achieved"),
            mb_achieved: get_bool(map, "mb_achieved"),
        })
    }
}

impl StabilityRecord {
    /// Parse from a loosely-typed map. All fields are optional.
    pub fn from_value(map: &Value) -> Result<Self> {
        Ok(StabilityRecord {
            condition_number: get_f64(map, "condition_number"),
            pivot_magnitude: get_f64(map, "pivot_magnitude"),
            matrix_norm: get_f64(map, "matrix_norm"),
            roundoff_error_estimate: get_f64(map, "roundoff_error_estimate"),
            backward_error: get_f64(map, "backward_error"),
            solution_smoothness: get_f64(map, "solution_smoothness"),
            negative_pressures: get_u32(map, "negative_pressures"),
            saturation_violations: get_u32(map, "saturation_violations"),
            unphysical_detected: get_bool(map, "unphysical_detected"),
        })
    }
}
