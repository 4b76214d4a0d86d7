//! Export artifacts for finalized solver diagnostics.
//!
//! One primary export per step name: a binary artifact with the full
//! finalized store, a parallel ML-features-only artifact, a human-readable
//! metadata sidecar, and a manifest with SHA-256 checksums. Telemetry
//! cannot be regenerated without re-running the simulation, so artifacts
//! are written atomically and never partially deleted on failure.

pub mod error;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use error::{ExportError, Result};
pub use manifest::{ArtifactKind, ExportManifest, FileEntry, MANIFEST_FILE_NAME};
pub use reader::ExportReader;
pub use writer::{export, ExportOptions, MetadataSidecar};

/// Category tag stamped into every metadata sidecar.
pub const DATA_CATEGORY: &str = "solver_diagnostics";

/// Criticality tag: this data cannot be regenerated without re-running
/// the simulation.
pub const CRITICALITY: &str = "high";
