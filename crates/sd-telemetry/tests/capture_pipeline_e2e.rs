//! End-to-end capture over a simulated solver loop, driving the store the
//! way the external driver does: loose JSON-ish maps in, typed records,
//! in-place mutation.

use serde_json::json;

use sd_common::{Error, NewtonRecord, ResidualRecord, StabilityRecord, TimestepRecord};
use sd_telemetry::{DiagnosticsStore, ModelInfo};

fn model() -> ModelInfo {
    ModelInfo {
        grid_cells: Some(2500),
        total_wells: Some(6),
    }
}

#[test]
fn full_capture_loop_populates_every_category() {
    let total = 12;
    let mut store = DiagnosticsStore::create(total, &model()).unwrap();

    for t in 1..=total {
        // Three Newton iterations per step, converging by an order of
        // magnitude each.
        for it in 1..=3u32 {
            let v = json!({
                "iteration_number": it,
                "residual_norm": 1e-2 * 10f64.powi(-(it as i32)),
                "newton_update_norm": 1e-3,
                "linear_solve_info": {
                    "solve_time": 0.01,
                    "linear_iterations": 20,
                    "linear_residual": 1e-9,
                    "condition_number": 1e6
                },
                "convergence_check": { "converged": it == 3 }
            });
            let rec = NewtonRecord::from_value(&v).unwrap();
            store.capture_newton_iteration(t, &rec).unwrap();
        }

        let ts = TimestepRecord::from_value(&json!({
            "dt_days": 5.0 + t as f64,
            "dt_cuts": 0,
            "cfl_number": 0.6,
            "selection_reason": "growth_limit",
            "total_timestep_time": 30.0,
            "newton_time": 18.0,
            "jacobian_time": 8.0,
            "peak_memory_mb": 900.0 + t as f64
        }))
        .unwrap();
        store.capture_timestep(t, &ts).unwrap();

        let res = ResidualRecord::from_value(&json!({
            "equation_residuals": [1e-5, 2e-5, 3e-5],
            "global_l2_norm": 4e-5,
            "global_linf_norm": 5e-5,
            "material_balance_error": 1e-9,
            "cnv_tolerance": 1e-3,
            "mb_tolerance": 1e-7
        }))
        .unwrap();
        store.capture_equation_residuals(t, &res).unwrap();

        let st = StabilityRecord::from_value(&json!({
            "condition_number": 2e6,
            "matrix_norm": 50.0 + t as f64,
            "roundoff_error_estimate": 1e-14,
            "solution_smoothness": 0.95
        }))
        .unwrap();
        store.capture_numerical_stability(t, &st).unwrap();
    }

    // Shape invariants hold after an arbitrary capture sequence.
    assert_eq!(store.convergence.iteration_count.len(), total);
    assert_eq!(store.timestep_control.dt_days.len(), total);
    assert_eq!(store.stability.condition_trend.len(), total);
    for t in 1..=total {
        assert_eq!(store.convergence.residual_norm.row(t).len(), 50);
    }

    assert!(store.convergence.converged.iter().all(|c| *c));
    assert_eq!(store.convergence.iteration_count[0], 3);
    assert!(store.timestep_control.growth_factor[1] > 1.0);
    assert_eq!(store.dropped_iterations, 0);
}

#[test]
fn missing_required_field_leaves_store_unchanged() {
    let mut store = DiagnosticsStore::create(5, &model()).unwrap();
    store
        .capture_newton_iteration(
            2,
            &NewtonRecord {
                iteration_number: 1,
                residual_norm: Some(1e-3),
                ..Default::default()
            },
        )
        .unwrap();
    let before = serde_json::to_string(&store).unwrap();

    // Driver hands over a Newton record without its category-defining field.
    let err = NewtonRecord::from_value(&json!({ "residual_norm": 1.0 })).unwrap_err();
    assert!(matches!(err, Error::MissingRequiredField { .. }));

    let after = serde_json::to_string(&store).unwrap();
    assert_eq!(before, after);
}

#[test]
fn capture_past_horizon_is_rejected() {
    let mut store = DiagnosticsStore::create(10, &model()).unwrap();
    let rec = TimestepRecord {
        dt_days: 1.0,
        ..Default::default()
    };
    let err = store.capture_timestep(11, &rec).unwrap_err();
    assert!(matches!(
        err,
        Error::IndexOutOfRange {
            index: 11,
            max: 10,
            ..
        }
    ));
}
