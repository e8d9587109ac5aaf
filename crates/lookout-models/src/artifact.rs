//! On-disk formats of the model and outlier artifacts.

use lookout_common::{
    ArtifactError, FeatureSchema, ProbabilisticClassifier, check_schema_version,
    load_json_artifact,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::classifier::Classifier;
use crate::outlier::{OneClassSvm, OutlierScorer};
use crate::transformer::FeatureTransformer;

/// Required artifact: declared schema plus the fitted classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Model release identifier.
    pub version: String,
    pub schema: FeatureSchema,
    pub classifier: Classifier,
    #[serde(default)]
    pub class_names: Vec<String>,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let artifact: Self = load_json_artifact(path)?;
        artifact.validate()?;
        info!(
            path = %path.display(),
            version = %artifact.version,
            schema_version = %artifact.schema.version,
            features = artifact.schema.arity(),
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        self.schema.validate()?;
        self.classifier.validate(self.schema.arity())?;
        if !self.class_names.is_empty() && self.class_names.len() != self.classifier.n_classes() {
            return Err(ArtifactError::Invalid(format!(
                "{} class names for a {}-class classifier",
                self.class_names.len(),
                self.classifier.n_classes()
            )));
        }
        Ok(())
    }

    /// Split into the transformer and classifier used at serving time.
    pub fn into_parts(self) -> Result<(FeatureTransformer, Classifier), ArtifactError> {
        let transformer = FeatureTransformer::new(self.schema)?;
        Ok((transformer, self.classifier))
    }
}

/// Optional artifact: outlier detector fitted on transformed training data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierArtifact {
    pub schema_version: String,
    pub detector: OneClassSvm,
}

impl OutlierArtifact {
    pub fn load(path: &Path, schema: &FeatureSchema) -> Result<OutlierScorer, ArtifactError> {
        let artifact: Self = load_json_artifact(path)?;
        let scorer = artifact.into_scorer(schema)?;
        info!(path = %path.display(), "Loaded outlier detector");
        Ok(scorer)
    }

    pub fn into_scorer(self, schema: &FeatureSchema) -> Result<OutlierScorer, ArtifactError> {
        check_schema_version(&schema.version, &self.schema_version)?;
        OutlierScorer::new(self.detector, schema.arity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LogisticRegression;
    use lookout_common::FeatureSpec;
    use std::io::Write;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            "s1",
            vec![
                FeatureSpec::Numeric { name: "age".into(), field: "age".into(), impute: None },
                FeatureSpec::Numeric { name: "fare".into(), field: "fare".into(), impute: None },
            ],
        )
    }

    fn model() -> ModelArtifact {
        ModelArtifact {
            version: "m1".into(),
            schema: schema(),
            classifier: Classifier::Logistic(LogisticRegression {
                coefficients: vec![vec![0.1, 0.2]],
                intercepts: vec![-1.0],
            }),
            class_names: vec!["died".into(), "survived".into()],
        }
    }

    #[test]
    fn model_artifact_roundtrips_through_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&model()).unwrap().as_bytes()).unwrap();

        let loaded = ModelArtifact::load(file.path()).unwrap();
        let (transformer, classifier) = loaded.into_parts().unwrap();
        assert_eq!(transformer.arity(), 2);
        assert_eq!(classifier.n_classes(), 2);
    }

    #[test]
    fn class_name_count_must_match() {
        let mut artifact = model();
        artifact.class_names.push("unknown".into());
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn outlier_artifact_requires_matching_schema() {
        let detector = OneClassSvm {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
            gamma: 0.1,
            support_vectors: vec![vec![0.0, 0.0]],
            dual_coef: vec![1.0],
            intercept: -0.5,
        };
        let wrong = OutlierArtifact { schema_version: "s0".into(), detector: detector.clone() };
        assert!(matches!(wrong.into_scorer(&schema()), Err(ArtifactError::SchemaMismatch { .. })));

        let right = OutlierArtifact { schema_version: "s1".into(), detector };
        assert!(right.into_scorer(&schema()).is_ok());
    }
}
