//! Deterministic mapping from raw records to numeric feature vectors.

use lookout_common::{
    ArtifactError, FeatureRecord, FeatureSchema, FeatureSpec, FeatureVector, RawValue,
    ValidationError,
};
use std::sync::Arc;
use tracing::debug;

/// Applies the declared [`FeatureSchema`] to incoming records.
///
/// Read-only after construction and shared across all request workers.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    schema: FeatureSchema,
    names: Arc<[String]>,
}

impl FeatureTransformer {
    pub fn new(schema: FeatureSchema) -> Result<Self, ArtifactError> {
        schema.validate()?;
        let names = schema.names();
        Ok(Self { schema, names })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn arity(&self) -> usize {
        self.schema.arity()
    }

    pub fn names(&self) -> Arc<[String]> {
        Arc::clone(&self.names)
    }

    /// Transform one record. Extra fields are ignored.
    pub fn transform(&self, record: &FeatureRecord) -> Result<FeatureVector, ValidationError> {
        let values = self
            .schema
            .features
            .iter()
            .map(|spec| encode(spec, record.get(spec.field())))
            .collect::<Result<Vec<_>, _>>()?;
        FeatureVector::new(self.names(), values)
    }

    pub fn transform_batch(
        &self,
        records: &[FeatureRecord],
    ) -> Result<Vec<FeatureVector>, ValidationError> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    /// Wrap an already transformed row, checking its length.
    pub fn vector(&self, values: Vec<f64>) -> Result<FeatureVector, ValidationError> {
        FeatureVector::new(self.names(), values)
    }
}

fn encode(spec: &FeatureSpec, value: &RawValue) -> Result<f64, ValidationError> {
    if value.is_nested() {
        return Err(ValidationError::UnsupportedValue(spec.field().to_string()));
    }
    match spec {
        FeatureSpec::Numeric { field, impute, .. } => match value.as_number() {
            Some(Ok(n)) if n.is_finite() => Ok(n),
            Some(Ok(_)) => {
                Err(ValidationError::NotNumeric { field: field.clone(), value: value.to_string() })
            }
            Some(Err(text)) => {
                Err(ValidationError::NotNumeric { field: field.clone(), value: text })
            }
            None => impute.ok_or_else(|| ValidationError::MissingField(field.clone())),
        },
        FeatureSpec::Categorical { field, categories, .. } => {
            let missing_code = categories.len();
            let code = match value.as_category() {
                Some(category) => categories.iter().position(|c| *c == category).unwrap_or_else(|| {
                    debug!(%field, %category, "Unknown category mapped to missing");
                    missing_code
                }),
                None => missing_code,
            };
            Ok(code as f64)
        }
        FeatureSpec::Token { token, .. } => {
            let present = match value {
                RawValue::Text(text) => contains_word(text, token),
                _ => false,
            };
            Ok(if present { 1.0 } else { 0.0 })
        }
        FeatureSpec::MissingIndicator { .. } => Ok(if value.is_missing() { 1.0 } else { 0.0 }),
    }
}

/// Whole-word, case-insensitive match over alphanumeric runs.
fn contains_word(text: &str, token: &str) -> bool {
    let token = token.to_lowercase();
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .any(|w| w.to_lowercase() == token)
}
