//! Per-feature drift detection against a reference batch.

use lookout_common::{
    ArtifactError, DriftTestResult, FeatureKind, FeatureSchema, FeatureVector, ValidationError,
};
use tracing::debug;

use crate::stats::{bincount, chi2_contingency, ks_2samp};

/// Family-wise significance level split across all features.
pub const DEFAULT_GLOBAL_P_VALUE: f64 = 0.5;

/// Reference data held column-major, with the statistical kind of each
/// column taken from the feature schema.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    kinds: Vec<FeatureKind>,
    columns: Vec<Vec<f64>>,
    global_p_value: f64,
}

impl DriftDetector {
    pub fn new(
        schema: &FeatureSchema,
        reference: &[FeatureVector],
        global_p_value: f64,
    ) -> Result<Self, ArtifactError> {
        if reference.is_empty() {
            return Err(ArtifactError::Invalid("drift reference batch is empty".into()));
        }
        if !(global_p_value > 0.0 && global_p_value <= 1.0) {
            return Err(ArtifactError::Invalid(format!(
                "global p-value {global_p_value} outside (0, 1]"
            )));
        }
        let kinds = schema.kinds();
        let columns = columns_of(reference, kinds.len()).map_err(|e| {
            ArtifactError::Invalid(format!("drift reference does not match the schema: {e}"))
        })?;

        debug!(rows = reference.len(), features = kinds.len(), "Built drift detector");
        Ok(Self { kinds, columns, global_p_value })
    }

    pub fn n_features(&self) -> usize {
        self.kinds.len()
    }

    pub fn reference_len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn global_p_value(&self) -> f64 {
        self.global_p_value
    }

    /// `global_p_value / n_features`.
    pub fn threshold(&self) -> f64 {
        self.global_p_value / self.kinds.len().max(1) as f64
    }

    /// One p-value per feature, in schema order.
    pub fn test(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ValidationError> {
        if batch.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        let candidate = columns_of(batch, self.kinds.len())?;

        let p_values = self
            .kinds
            .iter()
            .zip(self.columns.iter().zip(&candidate))
            .map(|(kind, (reference, sample))| match kind {
                FeatureKind::Continuous => ks_2samp(reference, sample).p_value,
                FeatureKind::Discrete { cardinality } => chi2_contingency(
                    &bincount(reference, *cardinality),
                    &bincount(sample, *cardinality),
                ),
            })
            .collect();
        Ok(p_values)
    }

    /// True when any feature rejects at the corrected threshold.
    pub fn predict(&self, batch: &[FeatureVector]) -> Result<bool, ValidationError> {
        Ok(self.evaluate(batch)?.drift)
    }

    pub fn evaluate(&self, batch: &[FeatureVector]) -> Result<DriftTestResult, ValidationError> {
        let result = DriftTestResult::from_p_values(self.test(batch)?, self.global_p_value);
        debug!(
            rows = batch.len(),
            threshold = result.threshold,
            drift = result.drift,
            "Evaluated drift"
        );
        Ok(result)
    }
}

fn columns_of(rows: &[FeatureVector], arity: usize) -> Result<Vec<Vec<f64>>, ValidationError> {
    let mut columns = vec![Vec::with_capacity(rows.len()); arity];
    for row in rows {
        if row.len() != arity {
            return Err(ValidationError::ArityMismatch { expected: arity, actual: row.len() });
        }
        for (column, &value) in columns.iter_mut().zip(row.values()) {
            column.push(value);
        }
    }
    Ok(columns)
}
