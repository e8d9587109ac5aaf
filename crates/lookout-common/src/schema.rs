//! Declared feature schema.
//!
//! The schema is the single source of truth for the output feature order,
//! their names, and which positions are discrete (with their vocabularies).
//! It ships inside the model artifact and is shared read-only by the feature
//! transformer, the local explainer and the drift detector.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::ArtifactError;

/// Name of the reserved category that absorbs missing and unknown values.
pub const MISSING_CATEGORY: &str = "Missing";

/// One output column of the feature transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    /// Numeric passthrough, optionally imputed when the field is missing.
    Numeric {
        name: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        impute: Option<f64>,
    },
    /// Ordinal-coded category. Code `categories.len()` is the reserved
    /// [`MISSING_CATEGORY`].
    Categorical { name: String, field: String, categories: Vec<String> },
    /// Binary presence of a whole word in a free-text field.
    Token { name: String, field: String, token: String },
    /// Binary flag set when the field is missing.
    MissingIndicator { name: String, field: String },
}

/// Statistical nature of a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Continuous,
    /// Integer codes in `0..cardinality`.
    Discrete { cardinality: usize },
}

impl FeatureSpec {
    pub fn name(&self) -> &str {
        match self {
            FeatureSpec::Numeric { name, .. }
            | FeatureSpec::Categorical { name, .. }
            | FeatureSpec::Token { name, .. }
            | FeatureSpec::MissingIndicator { name, .. } => name,
        }
    }

    /// Raw input field this feature reads from.
    pub fn field(&self) -> &str {
        match self {
            FeatureSpec::Numeric { field, .. }
            | FeatureSpec::Categorical { field, .. }
            | FeatureSpec::Token { field, .. }
            | FeatureSpec::MissingIndicator { field, .. } => field,
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureSpec::Numeric { .. } => FeatureKind::Continuous,
            FeatureSpec::Categorical { categories, .. } => {
                FeatureKind::Discrete { cardinality: categories.len() + 1 }
            }
            FeatureSpec::Token { .. } | FeatureSpec::MissingIndicator { .. } => {
                FeatureKind::Discrete { cardinality: 2 }
            }
        }
    }

    /// Human readable name of a discrete level. `None` for continuous
    /// features or out-of-range codes.
    pub fn level_name(&self, code: usize) -> Option<&str> {
        match self {
            FeatureSpec::Numeric { .. } => None,
            FeatureSpec::Categorical { categories, .. } => match code {
                c if c < categories.len() => Some(categories[c].as_str()),
                c if c == categories.len() => Some(MISSING_CATEGORY),
                _ => None,
            },
            FeatureSpec::Token { .. } | FeatureSpec::MissingIndicator { .. } => match code {
                0 => Some("0"),
                1 => Some("1"),
                _ => None,
            },
        }
    }
}

/// Versioned, ordered list of transformer output features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: String,
    pub features: Vec<FeatureSpec>,
}

impl FeatureSchema {
    pub fn new(version: impl Into<String>, features: Vec<FeatureSpec>) -> Self {
        Self { version: version.into(), features }
    }

    /// Number of output features.
    pub fn arity(&self) -> usize {
        self.features.len()
    }

    pub fn names(&self) -> Arc<[String]> {
        self.features.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.features.iter().map(FeatureSpec::kind).collect()
    }

    /// `(index, cardinality)` of every discrete output feature.
    pub fn discrete_features(&self) -> Vec<(usize, usize)> {
        self.features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| match f.kind() {
                FeatureKind::Discrete { cardinality } => Some((i, cardinality)),
                FeatureKind::Continuous => None,
            })
            .collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name() == name)
    }

    /// Structural checks run when the model artifact is loaded.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.features.is_empty() {
            return Err(ArtifactError::Invalid("feature schema declares no features".into()));
        }

        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.name()) {
                return Err(ArtifactError::Invalid(format!(
                    "duplicate feature name '{}'",
                    feature.name()
                )));
            }

            match feature {
                FeatureSpec::Categorical { name, categories, .. } => {
                    if categories.is_empty() {
                        return Err(ArtifactError::Invalid(format!(
                            "categorical feature '{name}' has no categories"
                        )));
                    }
                    let unique: HashSet<_> = categories.iter().collect();
                    if unique.len() != categories.len() {
                        return Err(ArtifactError::Invalid(format!(
                            "categorical feature '{name}' repeats a category"
                        )));
                    }
                    if categories.iter().any(|c| c == MISSING_CATEGORY) {
                        return Err(ArtifactError::Invalid(format!(
                            "categorical feature '{name}' declares the reserved \
                             category '{MISSING_CATEGORY}'"
                        )));
                    }
                }
                FeatureSpec::Token { name, token, .. } if token.trim().is_empty() => {
                    return Err(ArtifactError::Invalid(format!(
                        "token feature '{name}' has an empty token"
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            "v1",
            vec![
                FeatureSpec::Numeric {
                    name: "age".into(),
                    field: "age".into(),
                    impute: Some(28.0),
                },
                FeatureSpec::Categorical {
                    name: "sex".into(),
                    field: "sex".into(),
                    categories: vec!["female".into(), "male".into()],
                },
                FeatureSpec::Token {
                    name: "name_Mr".into(),
                    field: "name".into(),
                    token: "Mr".into(),
                },
                FeatureSpec::MissingIndicator { name: "miss_age".into(), field: "age".into() },
            ],
        )
    }

    #[test]
    fn discrete_positions_come_from_declaration() {
        let schema = schema();
        assert_eq!(schema.arity(), 4);
        assert_eq!(schema.discrete_features(), vec![(1, 3), (2, 2), (3, 2)]);
        assert_eq!(schema.kinds()[0], FeatureKind::Continuous);
        assert_eq!(schema.position("name_Mr"), Some(2));
    }

    #[test]
    fn reserved_level_names() {
        let schema = schema();
        assert_eq!(schema.features[1].level_name(0), Some("female"));
        assert_eq!(schema.features[1].level_name(2), Some(MISSING_CATEGORY));
        assert_eq!(schema.features[1].level_name(3), None);
        assert_eq!(schema.features[0].level_name(0), None);
    }

    #[test]
    fn validate_rejects_duplicates_and_reserved_names() {
        assert!(schema().validate().is_ok());

        let mut dup = schema();
        dup.features.push(FeatureSpec::MissingIndicator { name: "age".into(), field: "x".into() });
        assert!(dup.validate().is_err());

        let reserved = FeatureSchema::new(
            "v1",
            vec![FeatureSpec::Categorical {
                name: "embarked".into(),
                field: "embarked".into(),
                categories: vec!["S".into(), MISSING_CATEGORY.into()],
            }],
        );
        assert!(reserved.validate().is_err());

        assert!(FeatureSchema::new("v1", vec![]).validate().is_err());
    }

    #[test]
    fn deserializes_tagged_entries() {
        let json = r#"{
            "version": "2024-01",
            "features": [
                {"kind": "numeric", "name": "fare", "field": "fare"},
                {
                    "kind": "categorical",
                    "name": "embarked",
                    "field": "embarked",
                    "categories": ["C", "Q", "S"]
                }
            ]
        }"#;
        let schema: FeatureSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.version, "2024-01");
        assert_eq!(
            schema.features[0],
            FeatureSpec::Numeric { name: "fare".into(), field: "fare".into(), impute: None }
        );
        assert_eq!(schema.features[1].kind(), FeatureKind::Discrete { cardinality: 4 });
    }
}
