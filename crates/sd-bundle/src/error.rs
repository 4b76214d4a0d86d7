//! Error types for export operations.

use thiserror::Error;

/// Errors that can occur while writing or reading export artifacts.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error, with the path that failed.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Binary encoding/decoding error
    #[error("binary codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Checksum verification failed
    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// A file listed in the manifest is absent
    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    /// Unknown or unsupported manifest version
    #[error("unsupported manifest version: {version} (supported: {supported})")]
    UnsupportedVersion { version: String, supported: String },

    /// Corrupted or structurally invalid manifest
    #[error("corrupted manifest: {0}")]
    CorruptedManifest(String),

    /// Step name unusable as a path component
    #[error("invalid step name: '{0}'")]
    InvalidStepName(String),
}

impl ExportError {
    /// Attach a path to an I/O error.
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
