//! Error types for the solver diagnostics pipeline.
//!
//! Structural violations (bad index, missing required field, double
//! finalize) are fatal to the calling operation. Absent optional fields are
//! not errors; they leave cells at their defaults and show up later in the
//! data-quality completeness score.

use thiserror::Error;

/// Result type alias for diagnostics operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for store creation, capture, and finalization.
#[derive(Error, Debug)]
pub enum Error {
    /// Store creation with an unknown or invalid dimension.
    #[error("missing or invalid parameter: {name}")]
    MissingParameter { name: &'static str },

    /// A category-defining field was absent from an ingested record.
    #[error("record '{record}' is missing required field '{field}'")]
    MissingRequiredField {
        record: &'static str,
        field: &'static str,
    },

    /// Index outside the allocated bounds.
    #[error("{what} {index} out of range [1, {max}]")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        max: usize,
    },

    /// The store was already finalized; no further capture or finalize.
    #[error("store has already been finalized")]
    AlreadyFinalized,

    /// I/O error surfaced from an underlying operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error from loose-map record ingestion.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for contract violations the driver should treat as bugs in its
    /// own instrumentation rather than transient conditions.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::MissingParameter { .. }
                | Error::MissingRequiredField { .. }
                | Error::IndexOutOfRange { .. }
                | Error::AlreadyFinalized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_contract() {
        let err = Error::MissingRequiredField {
            record: "newton",
            field: "iteration_number",
        };
        let msg = err.to_string();
        assert!(msg.contains("newton"));
        assert!(msg.contains("iteration_number"));
    }

    #[test]
    fn test_index_out_of_range_display() {
        let err = Error::IndexOutOfRange {
            what: "timestep_index",
            index: 11,
            max: 10,
        };
        assert_eq!(err.to_string(), "timestep_index 11 out of range [1, 10]");
    }

    #[test]
    fn test_structural_classification() {
        assert!(Error::AlreadyFinalized.is_structural());
        assert!(Error::MissingParameter { name: "grid_cells" }.is_structural());
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!io.is_structural());
    }
}
