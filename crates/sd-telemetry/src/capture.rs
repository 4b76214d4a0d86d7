//! Capture API: one ingestion operation per telemetry category.
//!
//! Each operation validates the timestep index, writes the recognized
//! fields of the record in place, and performs the inline derivations
//! (growth factor, matrix-norm ratio, stagnation detection). Absent
//! optional fields leave cells at their zero/false defaults; structural
//! violations fail the call and leave the store untouched.

use tracing::debug;

use sd_common::{
    Error, NewtonRecord, ResidualRecord, Result, StabilityRecord, TimestepRecord,
    NEAR_SINGULAR_THRESHOLD,
};

use crate::store::DiagnosticsStore;
use crate::STAGNATION_EPSILON;

impl DiagnosticsStore {
    /// Capture one Newton iteration of timestep `t` (1-based).
    ///
    /// Iterations beyond `max_iterations_per_step` are dropped and counted
    /// rather than failing, to tolerate solvers with unusually many
    /// iterations.
    pub fn capture_newton_iteration(&mut self, t: usize, record: &NewtonRecord) -> Result<()> {
        self.check_open()?;
        let idx = self.check_timestep(t)?;

        let it = record.iteration_number as usize;
        if it == 0 {
            return Err(Error::IndexOutOfRange {
                what: "iteration_number",
                index: 0,
                max: self.metadata.max_iterations_per_step,
            });
        }
        if it > self.metadata.max_iterations_per_step {
            self.dropped_iterations += 1;
            debug!(
                timestep = t,
                iteration = it,
                cap = self.metadata.max_iterations_per_step,
                "dropping iteration beyond cap"
            );
            return Ok(());
        }

        let conv = &mut self.convergence;
        conv.iteration_count[idx] = conv.iteration_count[idx].max(record.iteration_number);
        if let Some(v) = record.residual_norm {
            conv.residual_norm.set(t, it, v);
        }
        if let Some(v) = record.residual_reduction {
            conv.residual_reduction.set(t, it, v);
        }
        if let Some(v) = record.newton_update_norm {
            conv.newton_update_norm.set(t, it, v);
        }
        if let Some(v) = record.flop_count {
            self.performance.flops.set(t, it, v);
        }

        if let Some(ls) = &record.linear_solve {
            let lin = &mut self.linear_solver;
            if let Some(v) = ls.solve_time {
                lin.solve_time.set(t, it, v);
            }
            if let Some(v) = ls.linear_iterations {
                lin.iterations.set(t, it, v as f64);
            }
            if let Some(v) = ls.linear_residual {
                lin.residual.set(t, it, v);
            }
            if let Some(v) = ls.condition_number {
                lin.condition_number[idx] = lin.condition_number[idx].max(v);
            }
            if let Some(v) = ls.rank_deficiency {
                lin.rank_deficiency[idx] = v;
            }
            if let Some(v) = ls.sparsity {
                lin.sparsity[idx] = v;
            }
            if let Some(v) = ls.assembly_time {
                lin.assembly_time[idx] = v;
            }
            if let Some(v) = ls.memory_mb {
                lin.memory_mb[idx] = v;
            }
        }

        if let Some(check) = &record.convergence {
            if check.converged {
                self.convergence.converged[idx] = true;
            } else {
                self.convergence.failure_count[idx] += 1;
            }
            if let Some(v) = check.cnv_satisfied {
                self.residuals.cnv_achieved[idx] = v;
            }
            if let Some(v) = check.mb_satisfied {
                self.residuals.mb_achieved[idx] = v;
            }
        }

        self.update_residual_derived(t, idx);
        Ok(())
    }

    /// Capture timestep control and timing for timestep `t` (1-based).
    pub fn capture_timestep(&mut self, t: usize, record: &TimestepRecord) -> Result<()> {
        self.check_open()?;
        let idx = self.check_timestep(t)?;

        let tc = &mut self.timestep_control;
        tc.dt_days[idx] = record.dt_days;
        if let Some(v) = record.dt_cuts {
            tc.dt_cuts[idx] = v;
        }
        if let Some(v) = record.cfl_number {
            tc.cfl_number[idx] = v;
        }
        if let Some(reason) = &record.selection_reason {
            tc.selection_reason[idx] = Some(reason.clone());
        }
        if let Some(v) = record.pressure_change_pa {
            tc.pressure_change_pa[idx] = Some(v);
        }
        if let Some(v) = record.max_saturation_change {
            tc.max_saturation_change[idx] = Some(v);
        }

        // Growth factor only when a previous positive dt exists.
        if idx > 0 && tc.dt_days[idx - 1] > 0.0 {
            tc.growth_factor[idx] = record.dt_days / tc.dt_days[idx - 1];
        }
        // Oscillation: growth crossing 1.0 in opposite directions on
        // consecutive steps.
        if idx > 1 {
            let cur = tc.growth_factor[idx];
            let prev = tc.growth_factor[idx - 1];
            if cur != 0.0 && prev != 0.0 && (cur - 1.0) * (prev - 1.0) < 0.0 {
                tc.oscillating[idx] = true;
            }
        }
        // Monotone growth over the trailing three steps.
        if idx > 1
            && tc.dt_days[idx] >= tc.dt_days[idx - 1]
            && tc.dt_days[idx - 1] >= tc.dt_days[idx - 2]
        {
            tc.monotonic[idx] = true;
        }
        tc.stable[idx] =
            record.dt_cuts.unwrap_or(0) == 0 && record.cfl_number.map_or(true, |c| c <= 1.0);

        let perf = &mut self.performance;
        if let Some(v) = record.total_timestep_time {
            perf.total_time[idx] = v;
        }
        if let Some(v) = record.newton_time {
            perf.newton_time[idx] = v;
        }
        if let Some(v) = record.jacobian_time {
            perf.jacobian_time[idx] = v;
        }
        if let Some(v) = record.residual_eval_time {
            perf.residual_eval_time[idx] = v;
        }
        if let Some(v) = record.well_update_time {
            perf.well_update_time[idx] = v;
        }
        if let Some(v) = record.peak_memory_mb {
            perf.memory_mb[idx] = v;
        }
        Ok(())
    }

    /// Capture per-equation residual state for timestep `t` (1-based).
    pub fn capture_equation_residuals(&mut self, t: usize, record: &ResidualRecord) -> Result<()> {
        self.check_open()?;
        let idx = self.check_timestep(t)?;

        let res = &mut self.residuals;
        if let Some(v) = record.equation_residuals {
            res.equation_residuals[idx] = v;
        }
        if let Some(v) = record.l2_norms {
            res.l2_norms[idx] = v;
        }
        if let Some(v) = record.linf_norms {
            res.linf_norms[idx] = v;
        }
        if let Some(v) = record.global_l2_norm {
            res.global_l2_norm[idx] = v;
        }
        if let Some(v) = record.global_linf_norm {
            res.global_linf_norm[idx] = v;
        }
        if let Some(v) = record.material_balance_error {
            res.material_balance_error[idx] = v;
        }
        if let Some(v) = record.cnv_achieved {
            res.cnv_achieved[idx] = v;
        }
        if let Some(v) = record.mb_achieved {
            res.mb_achieved[idx] = v;
        }
        // Margins need both the tolerance and the achieved norm.
        if let (Some(tol), Some(norm)) = (record.cnv_tolerance, record.global_linf_norm) {
            res.cnv_margin[idx] = tol - norm;
        }
        if let (Some(tol), Some(err)) = (record.mb_tolerance, record.material_balance_error) {
            res.mb_margin[idx] = tol - err;
        }
        Ok(())
    }

    /// Capture numerical stability indicators for timestep `t` (1-based).
    pub fn capture_numerical_stability(
        &mut self,
        t: usize,
        record: &StabilityRecord,
    ) -> Result<()> {
        self.check_open()?;
        let idx = self.check_timestep(t)?;

        let st = &mut self.stability;
        if let Some(cn) = record.condition_number {
            st.condition_trend[idx] = cn;
            if cn > NEAR_SINGULAR_THRESHOLD {
                st.near_singular[idx] = true;
                debug!(timestep = t, condition_number = cn, "near-singular system");
            }
        }
        if let Some(v) = record.pivot_magnitude {
            st.pivot_magnitude[idx] = v;
        }
        if let Some(cur) = record.matrix_norm {
            st.matrix_norm[idx] = cur;
            let prev = if idx > 0 { st.matrix_norm[idx - 1] } else { 0.0 };
            st.matrix_norm_ratio[idx] = if prev != 0.0 { cur / prev } else { cur };
        }
        if let Some(v) = record.roundoff_error_estimate {
            st.roundoff_error[idx] = v;
        }
        if let Some(v) = record.backward_error {
            st.backward_error[idx] = v;
        }
        if let Some(v) = record.solution_smoothness {
            st.solution_smoothness[idx] = v;
        }
        if let Some(v) = record.negative_pressures {
            st.negative_pressures[idx] = v;
        }
        if let Some(v) = record.saturation_violations {
            st.saturation_violations[idx] = v;
        }
        if let Some(v) = record.unphysical_detected {
            st.unphysical[idx] = v;
        }
        Ok(())
    }

    /// Recompute the per-timestep convergence rate and stagnation flag from
    /// the residual-norm iteration history of timestep `t`.
    fn update_residual_derived(&mut self, t: usize, idx: usize) {
        let row = self.convergence.residual_norm.row(t);
        let samples: Vec<f64> = row.iter().copied().filter(|v| *v != 0.0).collect();

        if samples.len() >= 2 {
            let mut sum = 0.0;
            let mut count = 0usize;
            for pair in samples.windows(2) {
                if pair[0] != 0.0 {
                    sum += pair[1] / pair[0];
                    count += 1;
                }
            }
            if count > 0 {
                self.convergence.convergence_rate[idx] = sum / count as f64;
            }
        }

        // Stagnation: the last 3 nonzero samples changed by less than
        // STAGNATION_EPSILON in absolute terms.
        if samples.len() >= 3 {
            let tail = &samples[samples.len() - 3..];
            if (tail[1] - tail[0]).abs() < STAGNATION_EPSILON
                && (tail[2] - tail[1]).abs() < STAGNATION_EPSILON
            {
                self.convergence.stagnation_flag[idx] = true;
                debug!(timestep = t, "newton residuals stagnating");
            }
        }
    }
}
