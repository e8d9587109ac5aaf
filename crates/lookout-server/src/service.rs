//! Inference orchestration over the loaded artifact bundle.

use lookout_common::{
    DriftTestResult, Explanation, FeatureRecord, LookoutError, ModelSignal, OutlierScore,
    Prediction, Result, ValidationError,
};
use std::sync::Arc;
use tracing::debug;

use crate::bundle::ArtifactBundle;

/// Result of one prediction request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictOutcome {
    pub prediction: Prediction,
    pub outlier_score: Option<OutlierScore>,
}

impl PredictOutcome {
    /// Values handed to the monitoring side-channel.
    pub fn signal(&self) -> ModelSignal {
        ModelSignal {
            score: self.prediction.score,
            label: self.prediction.label,
            outlier_score: self.outlier_score.map(|s| s.reported()),
        }
    }
}

/// Stateless request handling; cheap to clone.
#[derive(Debug, Clone)]
pub struct InferenceService {
    bundle: Arc<ArtifactBundle>,
}

impl InferenceService {
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self { bundle: Arc::new(bundle) }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Transform, classify and (when configured) score for outliers.
    pub fn predict(&self, record: &FeatureRecord) -> Result<PredictOutcome> {
        let vector = self.bundle.transformer.transform(record)?;
        let prediction = self.bundle.classifier.predict(vector.values()).ok_or_else(|| {
            LookoutError::Internal("classifier produced no finite probability".into())
        })?;
        let outlier_score = self.bundle.outlier.as_ref().map(|scorer| scorer.score(&vector));

        debug!(
            label = prediction.label,
            score = prediction.score,
            outlier = outlier_score.map(|s| s.reported()),
            "Prediction computed"
        );
        Ok(PredictOutcome { prediction, outlier_score })
    }

    /// Explain one record on the blocking pool so sampling never stalls the
    /// async workers.
    pub async fn explain(&self, record: FeatureRecord) -> Result<Explanation> {
        let explainer =
            self.bundle.explainer.clone().ok_or(LookoutError::NotConfigured("explainer"))?;
        let vector = self.bundle.transformer.transform(&record)?;
        let classifier = Arc::clone(&self.bundle.classifier);

        tokio::task::spawn_blocking(move || explainer.explain(&vector, classifier.as_ref()))
            .await
            .map_err(|e| LookoutError::Internal(format!("explain task failed: {e}")))?
    }

    /// Compare a batch of raw records against the drift reference.
    pub fn drift(&self, records: &[FeatureRecord]) -> Result<DriftTestResult> {
        let detector =
            self.bundle.drift.as_ref().ok_or(LookoutError::NotConfigured("drift detector"))?;
        if records.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let batch = self.bundle.transformer.transform_batch(records)?;
        Ok(detector.evaluate(&batch)?)
    }
}
