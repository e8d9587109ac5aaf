//! Assembly of the frozen artifact bundle.

use lookout_common::{ArtifactError, ProbabilisticClassifier};
use lookout_drift::{DriftDetector, DriftReference};
use lookout_explain::LocalExplainer;
use lookout_models::{Classifier, FeatureTransformer, ModelArtifact, OutlierArtifact, OutlierScorer};
use std::sync::Arc;
use tracing::info;

use crate::config::{ArtifactPaths, ExplainOverrides};

/// Everything needed to serve requests, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub model_version: String,
    pub class_names: Vec<String>,
    pub transformer: Arc<FeatureTransformer>,
    pub classifier: Arc<Classifier>,
    pub outlier: Option<Arc<OutlierScorer>>,
    pub explainer: Option<Arc<LocalExplainer>>,
    pub drift: Option<Arc<DriftDetector>>,
}

impl ArtifactBundle {
    /// Load every configured artifact. Any failure aborts startup.
    pub fn load(
        paths: &ArtifactPaths,
        overrides: &ExplainOverrides,
    ) -> Result<Self, ArtifactError> {
        let model_path = paths
            .model
            .as_deref()
            .ok_or_else(|| ArtifactError::Invalid("no model artifact configured".into()))?;
        let mut bundle = Self::from_model(ModelArtifact::load(model_path)?)?;

        if let Some(path) = &paths.outlier {
            let scorer = OutlierArtifact::load(path, bundle.transformer.schema())?;
            bundle = bundle.with_outlier(scorer);
        }
        if let Some(path) = &paths.explainer {
            let explainer = LocalExplainer::load(path, bundle.transformer.schema())?;
            bundle = bundle.with_explainer(apply_overrides(explainer, overrides))?;
        }
        if let Some(path) = &paths.drift_reference {
            let detector = DriftReference::load(path, &bundle.transformer)?;
            bundle = bundle.with_drift(detector);
        }

        info!(
            model_version = %bundle.model_version,
            schema_version = %bundle.schema_version(),
            outlier = bundle.outlier.is_some(),
            explainer = bundle.explainer.is_some(),
            drift = bundle.drift.is_some(),
            "Artifact bundle ready"
        );
        Ok(bundle)
    }

    pub fn from_model(model: ModelArtifact) -> Result<Self, ArtifactError> {
        model.validate()?;
        let model_version = model.version.clone();
        let class_names = model.class_names.clone();
        let (transformer, classifier) = model.into_parts()?;
        Ok(Self {
            model_version,
            class_names,
            transformer: Arc::new(transformer),
            classifier: Arc::new(classifier),
            outlier: None,
            explainer: None,
            drift: None,
        })
    }

    pub fn with_outlier(mut self, scorer: OutlierScorer) -> Self {
        self.outlier = Some(Arc::new(scorer));
        self
    }

    /// The explained class must be one the classifier produces.
    pub fn with_explainer(mut self, explainer: LocalExplainer) -> Result<Self, ArtifactError> {
        explainer.ensure_compatible(self.classifier.n_classes())?;
        self.explainer = Some(Arc::new(explainer));
        Ok(self)
    }

    pub fn with_drift(mut self, detector: DriftDetector) -> Self {
        self.drift = Some(Arc::new(detector));
        self
    }

    pub fn schema_version(&self) -> &str {
        &self.transformer.schema().version
    }
}

fn apply_overrides(explainer: LocalExplainer, overrides: &ExplainOverrides) -> LocalExplainer {
    let mut settings = explainer.settings().clone();
    if let Some(seed) = overrides.seed {
        settings.seed = Some(seed);
    }
    if let Some(samples) = overrides.num_samples {
        settings.num_samples = samples;
    }
    explainer.with_settings(settings)
}
