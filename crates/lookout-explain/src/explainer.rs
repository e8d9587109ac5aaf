//! Tabular local explainer.

use lookout_common::{
    ArtifactError, Contribution, Explanation, FeatureKind, FeatureSchema, FeatureSpec,
    FeatureVector, LookoutError, ProbabilisticClassifier, ValidationError, check_schema_version,
    load_json_artifact,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::discretizer::FeatureStatistics;
use crate::surrogate::weighted_ridge;

/// Penalty of the preliminary fit used to rank features.
const SELECTION_ALPHA: f64 = 0.01;

/// Sampling and surrogate parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainSettings {
    pub num_samples: usize,
    /// Maximum number of contributions reported.
    pub num_features: usize,
    /// Kernel width; `0.75 * sqrt(n_features)` when unset.
    pub kernel_width: Option<f64>,
    /// Class whose probability is explained.
    pub target_class: usize,
    pub ridge_alpha: f64,
    /// Fixed seed for reproducible neighborhoods. Unseeded runs differ.
    pub seed: Option<u64>,
}

impl Default for ExplainSettings {
    fn default() -> Self {
        Self {
            num_samples: 5000,
            num_features: 10,
            kernel_width: None,
            target_class: 1,
            ridge_alpha: 1.0,
            seed: None,
        }
    }
}

/// Serialized explainer: training statistics plus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerArtifact {
    pub schema_version: String,
    #[serde(default)]
    pub class_names: Vec<String>,
    #[serde(default)]
    pub settings: ExplainSettings,
    pub features: Vec<FeatureStatistics>,
}

/// Explains single predictions. Read-only after construction.
#[derive(Debug, Clone)]
pub struct LocalExplainer {
    schema: FeatureSchema,
    statistics: Vec<FeatureStatistics>,
    class_names: Vec<String>,
    settings: ExplainSettings,
}

impl LocalExplainer {
    /// Compute training statistics from transformed training rows.
    pub fn fit(
        schema: &FeatureSchema,
        training: &[FeatureVector],
        class_names: Vec<String>,
        settings: ExplainSettings,
    ) -> Result<Self, ArtifactError> {
        if training.is_empty() {
            return Err(ArtifactError::Invalid("explainer needs at least one training row".into()));
        }
        if let Some(row) = training.iter().find(|r| r.len() != schema.arity()) {
            return Err(ArtifactError::Invalid(format!(
                "training row has {} features, schema declares {}",
                row.len(),
                schema.arity()
            )));
        }

        let statistics = schema
            .kinds()
            .into_iter()
            .enumerate()
            .map(|(j, kind)| {
                let column: Vec<f64> = training.iter().map(|r| r.values()[j]).collect();
                match kind {
                    FeatureKind::Continuous => FeatureStatistics::continuous(&column),
                    FeatureKind::Discrete { cardinality } => {
                        FeatureStatistics::discrete(&column, cardinality)
                    }
                }
            })
            .collect();

        debug!(rows = training.len(), features = schema.arity(), "Fitted explainer statistics");
        Ok(Self { schema: schema.clone(), statistics, class_names, settings })
    }

    pub fn load(path: &Path, schema: &FeatureSchema) -> Result<Self, ArtifactError> {
        let artifact: ExplainerArtifact = load_json_artifact(path)?;
        let explainer = Self::from_artifact(artifact, schema)?;
        info!(
            path = %path.display(),
            num_samples = explainer.settings.num_samples,
            target_class = explainer.settings.target_class,
            "Loaded explainer"
        );
        Ok(explainer)
    }

    /// Bind a loaded artifact to the model schema.
    pub fn from_artifact(
        artifact: ExplainerArtifact,
        schema: &FeatureSchema,
    ) -> Result<Self, ArtifactError> {
        check_schema_version(&schema.version, &artifact.schema_version)?;
        if artifact.features.len() != schema.arity() {
            return Err(ArtifactError::Invalid(format!(
                "explainer has statistics for {} features, schema declares {}",
                artifact.features.len(),
                schema.arity()
            )));
        }

        for (spec, stats) in schema.features.iter().zip(&artifact.features) {
            let consistent = match (spec.kind(), stats) {
                (FeatureKind::Continuous, FeatureStatistics::Continuous { boundaries, bins }) => {
                    !boundaries.is_empty() && bins.len() == boundaries.len() + 1
                }
                (
                    FeatureKind::Discrete { cardinality },
                    FeatureStatistics::Discrete { frequencies },
                ) => frequencies.len() == cardinality,
                _ => false,
            };
            if !consistent {
                return Err(ArtifactError::Invalid(format!(
                    "explainer statistics for '{}' do not match its declared kind",
                    spec.name()
                )));
            }
        }

        if artifact.settings.num_samples < 2 || artifact.settings.num_features == 0 {
            return Err(ArtifactError::Invalid(
                "explainer needs at least two samples and one reported feature".into(),
            ));
        }

        Ok(Self {
            schema: schema.clone(),
            statistics: artifact.features,
            class_names: artifact.class_names,
            settings: artifact.settings,
        })
    }

    pub fn to_artifact(&self) -> ExplainerArtifact {
        ExplainerArtifact {
            schema_version: self.schema.version.clone(),
            class_names: self.class_names.clone(),
            settings: self.settings.clone(),
            features: self.statistics.clone(),
        }
    }

    pub fn settings(&self) -> &ExplainSettings {
        &self.settings
    }

    pub fn with_settings(mut self, settings: ExplainSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// The explained class must exist in the classifier output.
    pub fn ensure_compatible(&self, n_classes: usize) -> Result<(), ArtifactError> {
        if self.settings.target_class >= n_classes {
            return Err(ArtifactError::Invalid(format!(
                "explainer targets class {} of a {n_classes}-class model",
                self.settings.target_class
            )));
        }
        Ok(())
    }

    /// Explain one transformed instance against the given classifier.
    pub fn explain(
        &self,
        instance: &FeatureVector,
        classifier: &dyn ProbabilisticClassifier,
    ) -> Result<Explanation, LookoutError> {
        let n = self.schema.arity();
        if instance.len() != n {
            let actual = instance.len();
            return Err(ValidationError::ArityMismatch { expected: n, actual }.into());
        }
        let target = self.settings.target_class;
        if target >= classifier.n_classes() {
            return Err(LookoutError::Internal(format!(
                "explained class {target} outside {} classifier outputs",
                classifier.n_classes()
            )));
        }

        let mut rng = match self.settings.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };

        let instance_levels: Vec<usize> = self
            .statistics
            .iter()
            .zip(instance.values())
            .map(|(s, &v)| s.discretize(v))
            .collect();
        let frequencies: Vec<Vec<f64>> = self.statistics.iter().map(|s| s.frequencies()).collect();

        let m = self.settings.num_samples.max(2);
        let mut binary = Vec::with_capacity(m);
        let mut targets = Vec::with_capacity(m);
        binary.push(vec![1.0; n]);
        targets.push(classifier.predict_proba(instance.values())[target]);

        let mut neighbor = vec![0.0; n];
        for _ in 1..m {
            let mut row = vec![0.0; n];
            for j in 0..n {
                let level = sample_level(&frequencies[j], instance_levels[j], &mut rng);
                row[j] = if level == instance_levels[j] { 1.0 } else { 0.0 };
                neighbor[j] = self.statistics[j].undiscretize(level, &mut rng);
            }
            targets.push(classifier.predict_proba(&neighbor)[target]);
            binary.push(row);
        }

        let width = self.settings.kernel_width.unwrap_or_else(|| 0.75 * (n as f64).sqrt());
        let weights: Vec<f64> = binary
            .iter()
            .map(|row| {
                let d2: f64 = row.iter().map(|z| (z - 1.0) * (z - 1.0)).sum();
                (-d2 / (width * width)).exp().sqrt()
            })
            .collect();

        let all: Vec<usize> = (0..n).collect();
        let selected = if n > self.settings.num_features {
            let ranking = weighted_ridge(&binary, &targets, &weights, &all, SELECTION_ALPHA)
                .map_err(|e| LookoutError::Internal(format!("feature selection failed: {e}")))?;
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                ranking.coefficients[b].abs().total_cmp(&ranking.coefficients[a].abs())
            });
            order.truncate(self.settings.num_features);
            order.sort_unstable();
            order
        } else {
            all
        };

        let fit = weighted_ridge(&binary, &targets, &weights, &selected, self.settings.ridge_alpha)
            .map_err(|e| LookoutError::Internal(format!("surrogate fit failed: {e}")))?;

        let mut contributions: Vec<Contribution> = fit
            .columns
            .iter()
            .zip(&fit.coefficients)
            .map(|(&j, &weight)| Contribution {
                characteristic: self.characteristic(j, instance_levels[j]),
                contribution: weight,
            })
            .collect();
        contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

        debug!(
            samples = m,
            selected = fit.columns.len(),
            r2 = fit.r2,
            "Fitted local surrogate"
        );

        Ok(Explanation {
            contributions,
            explained_class: target,
            intercept: fit.intercept,
            local_prediction: fit.predict(&binary[0]),
            score: fit.r2,
        })
    }

    fn characteristic(&self, index: usize, level: usize) -> String {
        let spec = &self.schema.features[index];
        let stats = &self.statistics[index];
        if let Some(label) = stats.continuous_label(spec.name(), level) {
            return label;
        }
        match spec {
            FeatureSpec::Numeric { name, .. } => format!("{name}={level}"),
            _ => match spec.level_name(level) {
                Some(value) => format!("{}={value}", spec.name()),
                None => format!("{}={level}", spec.name()),
            },
        }
    }
}

/// Draw a level from training frequencies; falls back to the instance level
/// when the feature had no training mass.
fn sample_level<R: Rng>(frequencies: &[f64], fallback: usize, rng: &mut R) -> usize {
    let total: f64 = frequencies.iter().sum();
    if total <= 0.0 {
        return fallback;
    }
    let mut draw = rng.random::<f64>() * total;
    for (level, &f) in frequencies.iter().enumerate() {
        if draw < f {
            return level;
        }
        draw -= f;
    }
    frequencies.iter().rposition(|&f| f > 0.0).unwrap_or(fallback)
}
