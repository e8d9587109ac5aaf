//! Drift reference artifact.

use lookout_common::{ArtifactError, FeatureRecord, check_schema_version, load_json_artifact};
use lookout_models::FeatureTransformer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::detector::{DEFAULT_GLOBAL_P_VALUE, DriftDetector};

fn default_global_p_value() -> f64 {
    DEFAULT_GLOBAL_P_VALUE
}

/// Raw reference records, transformed once when the detector is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReference {
    pub schema_version: String,
    #[serde(default = "default_global_p_value")]
    pub global_p_value: f64,
    pub records: Vec<FeatureRecord>,
}

impl DriftReference {
    pub fn load(
        path: &Path,
        transformer: &FeatureTransformer,
    ) -> Result<DriftDetector, ArtifactError> {
        let reference: Self = load_json_artifact(path)?;
        let rows = reference.records.len();
        let detector = reference.into_detector(transformer)?;
        info!(
            path = %path.display(),
            rows,
            global_p_value = detector.global_p_value(),
            "Loaded drift reference"
        );
        Ok(detector)
    }

    pub fn into_detector(
        self,
        transformer: &FeatureTransformer,
    ) -> Result<DriftDetector, ArtifactError> {
        let schema = transformer.schema();
        check_schema_version(&schema.version, &self.schema_version)?;
        let vectors = transformer
            .transform_batch(&self.records)
            .map_err(|e| ArtifactError::Invalid(format!("drift reference record rejected: {e}")))?;
        DriftDetector::new(schema, &vectors, self.global_p_value)
    }
}
