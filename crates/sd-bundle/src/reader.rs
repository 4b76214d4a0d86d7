//! Export reader: open an export directory and read its artifacts back.

use std::fs;
use std::path::{Path, PathBuf};

use sd_report::{FinalizedStore, MlFeatureSet};

use crate::error::{ExportError, Result};
use crate::manifest::{ArtifactKind, ExportManifest, FileEntry, MANIFEST_FILE_NAME};
use crate::writer::MetadataSidecar;

/// Reader over one export directory, anchored on its manifest.
#[derive(Debug)]
pub struct ExportReader {
    dir: PathBuf,
    manifest: ExportManifest,
}

impl ExportReader {
    /// Open an export directory and parse its manifest.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let json = fs::read_to_string(&manifest_path)
            .map_err(|e| ExportError::io(&manifest_path, e))?;
        let manifest = ExportManifest::from_json(&json)?;
        manifest.validate()?;
        Ok(ExportReader { dir, manifest })
    }

    pub fn manifest(&self) -> &ExportManifest {
        &self.manifest
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read and decode the primary artifact.
    pub fn read_finalized(&self) -> Result<FinalizedStore> {
        let bytes = self.read_verified(ArtifactKind::Primary)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Read and decode the ML-features-only artifact.
    pub fn read_ml_features(&self) -> Result<MlFeatureSet> {
        let bytes = self.read_verified(ArtifactKind::MlFeatures)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Read and parse the metadata sidecar.
    pub fn read_metadata(&self) -> Result<MetadataSidecar> {
        let bytes = self.read_verified(ArtifactKind::Metadata)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Verify every manifest entry against its on-disk checksum.
    pub fn verify(&self) -> Result<()> {
        for entry in &self.manifest.files {
            self.read_entry(entry)?;
        }
        Ok(())
    }

    fn read_verified(&self, kind: ArtifactKind) -> Result<Vec<u8>> {
        let entry = self
            .manifest
            .find_kind(kind)
            .ok_or_else(|| ExportError::MissingArtifact(kind.to_string()))?;
        self.read_entry(entry)
    }

    fn read_entry(&self, entry: &FileEntry) -> Result<Vec<u8>> {
        let path = self.dir.join(&entry.path);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExportError::MissingArtifact(entry.path.clone()))
            }
            Err(e) => return Err(ExportError::io(&path, e)),
        };
        if !entry.verify(&bytes) {
            return Err(ExportError::ChecksumMismatch {
                path: entry.path.clone(),
                expected: entry.sha256.clone(),
                actual: FileEntry::compute_checksum(&bytes),
            });
        }
        Ok(bytes)
    }
}
