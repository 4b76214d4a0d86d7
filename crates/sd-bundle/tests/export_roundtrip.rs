//! Export/read-back pipeline over a finalized run.

use std::fs;

use tempfile::TempDir;

use sd_bundle::{export, ExportError, ExportOptions, ExportReader};
use sd_common::{ConvergenceCheck, NewtonRecord, StabilityRecord, TimestepRecord};
use sd_report::{finalize, FinalizedStore};
use sd_telemetry::{DiagnosticsStore, ModelInfo};

fn finalized_run(total: usize) -> FinalizedStore {
    let mut store = DiagnosticsStore::create(
        total,
        &ModelInfo {
            grid_cells: Some(800),
            total_wells: Some(3),
        },
    )
    .unwrap();
    for t in 1..=total {
        for it in 1..=4u32 {
            store
                .capture_newton_iteration(
                    t,
                    &NewtonRecord {
                        iteration_number: it,
                        residual_norm: Some(10f64.powi(-(it as i32))),
                        convergence: Some(ConvergenceCheck {
                            converged: it == 4,
                            cnv_satisfied: None,
                            mb_satisfied: None,
                        }),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        store
            .capture_timestep(
                t,
                &TimestepRecord {
                    dt_days: 3.0,
                    cfl_number: Some(0.4),
                    total_timestep_time: Some(15.0),
                    newton_time: Some(9.0),
                    peak_memory_mb: Some(600.0),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .capture_numerical_stability(
                t,
                &StabilityRecord {
                    condition_number: Some(4e8),
                    ..Default::default()
                },
            )
            .unwrap();
    }
    finalize(&mut store).unwrap()
}

#[test]
fn roundtrip_reproduces_summary_and_features() {
    let tmp = TempDir::new().unwrap();
    let finalized = finalized_run(25);

    let manifest = export(&finalized, "s21_diagnostics", &ExportOptions::new(tmp.path())).unwrap();
    assert_eq!(manifest.files.len(), 3);
    assert_eq!(manifest.step_name, "s21_diagnostics");

    let export_dir = tmp
        .path()
        .join(format!("s21_diagnostics_{}", manifest.created_at.format("%Y%m%d_%H%M%S")));
    let reader = ExportReader::open(&export_dir).unwrap();
    reader.verify().unwrap();

    let back = reader.read_finalized().unwrap();
    // bincode round-trips f64 bitwise, so exact equality is expected.
    assert_eq!(back.summary, finalized.summary);
    assert_eq!(back.features, finalized.features);
    assert_eq!(back.quality, finalized.quality);
    assert_eq!(back.metadata.run_id, finalized.metadata.run_id);

    let features = reader.read_ml_features().unwrap();
    assert_eq!(features, finalized.features);

    let meta = reader.read_metadata().unwrap();
    assert_eq!(meta.data_category, "solver_diagnostics");
    assert_eq!(meta.criticality, "high");
    assert_eq!(meta.total_timesteps, 25);
    assert!(meta.intended_usage.contains(&"ml_training".to_string()));
}

#[cfg(unix)]
#[test]
fn latest_alias_points_at_export_dir() {
    let tmp = TempDir::new().unwrap();
    let finalized = finalized_run(5);

    let manifest = export(&finalized, "s21_diagnostics", &ExportOptions::new(tmp.path())).unwrap();
    assert_eq!(manifest.symlink_count, 1);

    let alias = tmp.path().join("s21_diagnostics_latest");
    let reader = ExportReader::open(&alias).unwrap();
    assert_eq!(reader.manifest().step_name, "s21_diagnostics");

    // Re-export replaces the alias instead of failing.
    let opts = ExportOptions::new(tmp.path())
        .with_timestamp(manifest.created_at + chrono::Duration::seconds(1));
    let second = export(&finalized, "s21_diagnostics", &opts).unwrap();
    assert_eq!(second.symlink_count, 1);
}

#[test]
fn alias_can_be_disabled() {
    let tmp = TempDir::new().unwrap();
    let finalized = finalized_run(5);
    let opts = ExportOptions::new(tmp.path()).without_latest_alias();
    let manifest = export(&finalized, "s03_diag", &opts).unwrap();
    assert_eq!(manifest.symlink_count, 0);
    assert!(!tmp.path().join("s03_diag_latest").exists());
}

#[test]
fn verify_detects_corruption() {
    let tmp = TempDir::new().unwrap();
    let finalized = finalized_run(5);
    let manifest = export(&finalized, "s21_diagnostics", &ExportOptions::new(tmp.path())).unwrap();

    let export_dir = tmp
        .path()
        .join(format!("s21_diagnostics_{}", manifest.created_at.format("%Y%m%d_%H%M%S")));
    fs::write(export_dir.join("s21_diagnostics_metadata.json"), b"{}").unwrap();

    let reader = ExportReader::open(&export_dir).unwrap();
    assert!(matches!(
        reader.verify().unwrap_err(),
        ExportError::ChecksumMismatch { .. }
    ));
    // The untampered artifacts still read back fine.
    assert!(reader.read_finalized().is_ok());
}

#[test]
fn open_without_manifest_fails() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(
        ExportReader::open(tmp.path()).unwrap_err(),
        ExportError::Io { .. }
    ));
}
