//! Export manifest: the source of truth for an export's contents.
//!
//! Lists every written artifact with its SHA-256 checksum and byte size,
//! plus the identity of the run it came from and how many alias symlinks
//! were created for alternate access-path conventions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ExportError, Result};

/// Current manifest format version.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Manifest file name within the export directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Role of an artifact within the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Full finalized store (binary).
    Primary,
    /// ML-features-only artifact (binary).
    MlFeatures,
    /// Human-readable metadata sidecar (JSON).
    Metadata,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Primary => write!(f, "primary"),
            ArtifactKind::MlFeatures => write!(f, "ml_features"),
            ArtifactKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// File entry in the manifest with checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the export directory.
    pub path: String,
    pub kind: ArtifactKind,
    /// SHA-256 checksum (64 hex characters).
    pub sha256: String,
    pub bytes: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, kind: ArtifactKind, data: &[u8]) -> Self {
        Self {
            path: path.into(),
            kind,
            sha256: Self::compute_checksum(data),
            bytes: data.len() as u64,
        }
    }

    /// Compute SHA-256 checksum of data.
    pub fn compute_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Verify the checksum against data.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute_checksum(data) == self.sha256
    }
}

/// Manifest returned by `export` and persisted next to the artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub manifest_version: String,
    /// Schema version of the telemetry inside the artifacts.
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    pub run_id: String,
    pub step_name: String,
    pub files: Vec<FileEntry>,
    /// Alias symlinks created for alternate access paths.
    pub symlink_count: usize,
}

impl ExportManifest {
    pub fn new(
        step_name: impl Into<String>,
        run_id: impl Into<String>,
        schema_version: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            manifest_version: MANIFEST_VERSION.to_string(),
            schema_version: schema_version.into(),
            created_at,
            run_id: run_id.into(),
            step_name: step_name.into(),
            files: Vec::new(),
            symlink_count: 0,
        }
    }

    pub fn add_file(&mut self, entry: FileEntry) {
        self.files.push(entry);
    }

    /// Find the entry with the given role.
    pub fn find_kind(&self, kind: ArtifactKind) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.kind == kind)
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    /// Validate the manifest structure.
    pub fn validate(&self) -> Result<()> {
        if self.manifest_version != MANIFEST_VERSION {
            return Err(ExportError::UnsupportedVersion {
                version: self.manifest_version.clone(),
                supported: MANIFEST_VERSION.to_string(),
            });
        }
        if self.step_name.is_empty() {
            return Err(ExportError::CorruptedManifest(
                "step_name is empty".to_string(),
            ));
        }
        for file in &self.files {
            if file.path.is_empty() {
                return Err(ExportError::CorruptedManifest(
                    "file entry has empty path".to_string(),
                ));
            }
            if file.sha256.len() != 64 {
                return Err(ExportError::CorruptedManifest(format!(
                    "file '{}' has invalid checksum length",
                    file.path
                )));
            }
        }
        Ok(())
    }

    /// Serialize to JSON with consistent formatting.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
