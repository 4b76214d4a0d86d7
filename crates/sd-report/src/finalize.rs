//! Finalize a capture session: freeze the store and derive all views.

use serde::{Deserialize, Serialize};
use tracing::info;

use sd_common::Result;
use sd_telemetry::{DiagnosticsStore, StoreMetadata};

use crate::features::{compute_features, MlFeatureSet};
use crate::quality::{assess_quality, QualityReport};
use crate::summary::{compute_summary, SummaryStatistics};

/// A frozen capture session with its derived views, ready for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedStore {
    pub metadata: StoreMetadata,
    pub summary: SummaryStatistics,
    pub features: MlFeatureSet,
    pub quality: QualityReport,
    /// Frozen snapshot of the raw telemetry.
    pub telemetry: DiagnosticsStore,
}

/// Freeze the store and compute summary statistics, ML features, and the
/// quality report. Callable exactly once; a second call fails with
/// [`sd_common::Error::AlreadyFinalized`].
pub fn finalize(store: &mut DiagnosticsStore) -> Result<FinalizedStore> {
    store.mark_finalized()?;

    let summary = compute_summary(store);
    let features = compute_features(store);
    let quality = assess_quality(store, &features);

    info!(
        run_id = %store.metadata.run_id,
        timesteps = store.metadata.total_timesteps,
        success_rate = summary.convergence_success_rate,
        completeness = quality.completeness_pct,
        readiness = %quality.readiness,
        "finalized diagnostics store"
    );

    Ok(FinalizedStore {
        metadata: store.metadata.clone(),
        summary,
        features,
        quality,
        telemetry: store.clone(),
    })
}
