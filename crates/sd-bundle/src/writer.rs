//! Export writer: serialize a finalized store to canonical artifacts.
//!
//! Every file goes through a temp-file write followed by an atomic rename,
//! so readers never observe a half-written artifact. Failures surface the
//! underlying cause and leave already-written files in place.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use sd_report::FinalizedStore;

use crate::error::{ExportError, Result};
use crate::manifest::{ArtifactKind, ExportManifest, FileEntry, MANIFEST_FILE_NAME};
use crate::{CRITICALITY, DATA_CATEGORY};

/// Configuration for one export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory under which the export directory is created.
    pub base_dir: PathBuf,

    /// Timestamp used in the export directory name. Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,

    /// Create a `<step_name>_latest` symlink next to the export directory.
    pub create_latest_alias: bool,

    /// Usage tags stamped into the metadata sidecar.
    pub intended_usage: Vec<String>,
}

impl ExportOptions {
    /// Create options with defaults.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        ExportOptions {
            base_dir: base_dir.into(),
            timestamp: None,
            create_latest_alias: true,
            intended_usage: vec![
                "ml_training".to_string(),
                "convergence_analysis".to_string(),
                "debugging".to_string(),
            ],
        }
    }

    /// Pin the directory timestamp (useful for reproducible layouts).
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Disable the `latest` alias symlink.
    pub fn without_latest_alias(mut self) -> Self {
        self.create_latest_alias = false;
        self
    }

    /// Replace the intended-usage tags.
    pub fn with_intended_usage(mut self, tags: Vec<String>) -> Self {
        self.intended_usage = tags;
        self
    }
}

/// Human-readable sidecar describing the export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSidecar {
    pub data_category: String,
    pub criticality: String,
    pub intended_usage: Vec<String>,
    pub schema_version: String,
    pub run_id: String,
    pub step_name: String,
    pub created_at: DateTime<Utc>,
    pub total_timesteps: usize,
}

/// Export a finalized store under `step_name`, returning the manifest.
///
/// Writes the primary binary artifact, the ML-features-only artifact, the
/// metadata sidecar, and the manifest itself.
pub fn export(
    finalized: &FinalizedStore,
    step_name: &str,
    options: &ExportOptions,
) -> Result<ExportManifest> {
    validate_step_name(step_name)?;

    let created_at = options.timestamp.unwrap_or_else(Utc::now);
    let dir_name = format!("{step_name}_{}", created_at.format("%Y%m%d_%H%M%S"));
    let export_dir = options.base_dir.join(&dir_name);
    fs::create_dir_all(&export_dir).map_err(|e| ExportError::io(&export_dir, e))?;

    let mut manifest = ExportManifest::new(
        step_name,
        finalized.metadata.run_id.to_string(),
        finalized.metadata.schema_version.clone(),
        created_at,
    );

    // Primary artifact: the full finalized store.
    let primary_name = format!("{step_name}.bin");
    let primary_bytes = bincode::serialize(finalized)?;
    write_atomic(&export_dir.join(&primary_name), &primary_bytes)?;
    manifest.add_file(FileEntry::new(
        &primary_name,
        ArtifactKind::Primary,
        &primary_bytes,
    ));

    // Parallel ML-features-only artifact.
    let features_name = format!("{step_name}_ml_features.bin");
    let features_bytes = bincode::serialize(&finalized.features)?;
    write_atomic(&export_dir.join(&features_name), &features_bytes)?;
    manifest.add_file(FileEntry::new(
        &features_name,
        ArtifactKind::MlFeatures,
        &features_bytes,
    ));

    // Human-readable sidecar.
    let sidecar = MetadataSidecar {
        data_category: DATA_CATEGORY.to_string(),
        criticality: CRITICALITY.to_string(),
        intended_usage: options.intended_usage.clone(),
        schema_version: finalized.metadata.schema_version.clone(),
        run_id: finalized.metadata.run_id.to_string(),
        step_name: step_name.to_string(),
        created_at,
        total_timesteps: finalized.metadata.total_timesteps,
    };
    let sidecar_name = format!("{step_name}_metadata.json");
    let sidecar_bytes = serde_json::to_vec_pretty(&sidecar)?;
    write_atomic(&export_dir.join(&sidecar_name), &sidecar_bytes)?;
    manifest.add_file(FileEntry::new(
        &sidecar_name,
        ArtifactKind::Metadata,
        &sidecar_bytes,
    ));

    manifest.symlink_count = if options.create_latest_alias {
        create_latest_alias(&options.base_dir, step_name, &dir_name)?
    } else {
        0
    };

    // Manifest last: its presence marks a complete export.
    let manifest_json = manifest.to_json()?;
    write_atomic(&export_dir.join(MANIFEST_FILE_NAME), manifest_json.as_bytes())?;

    info!(
        step_name,
        dir = %export_dir.display(),
        files = manifest.files.len(),
        bytes = manifest.total_bytes(),
        symlinks = manifest.symlink_count,
        "export complete"
    );
    Ok(manifest)
}

/// Reject step names that would escape the base directory.
fn validate_step_name(step_name: &str) -> Result<()> {
    if step_name.is_empty() || step_name.contains(['/', '\\']) {
        return Err(ExportError::InvalidStepName(step_name.to_string()));
    }
    Ok(())
}

/// Write bytes through a temp file and atomic rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes).map_err(|e| ExportError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| ExportError::io(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn create_latest_alias(base_dir: &Path, step_name: &str, dir_name: &str) -> Result<usize> {
    let alias = base_dir.join(format!("{step_name}_latest"));
    if alias.symlink_metadata().is_ok() {
        fs::remove_file(&alias).map_err(|e| ExportError::io(&alias, e))?;
    }
    std::os::unix::fs::symlink(dir_name, &alias).map_err(|e| ExportError::io(&alias, e))?;
    Ok(1)
}

#[cfg(not(unix))]
fn create_latest_alias(_base_dir: &Path, _step_name: &str, _dir_name: &str) -> Result<usize> {
    Ok(0)
}
