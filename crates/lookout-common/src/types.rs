//! Request-scoped value types produced by the inference pipeline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ValidationError;

/// Lower clamp applied to the halved outlier decision value.
pub const OUTLIER_LOWER_BOUND: f64 = -2.0;

/// Offset added before histogram aggregation so the decision boundary (0)
/// lands in the middle of the `[0, 2)` bucket range.
pub const OUTLIER_HISTOGRAM_SHIFT: f64 = 1.0;

/// Transformed numeric features in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Pair values with their feature names. Lengths must agree.
    pub fn new(names: Arc<[String]>, values: Vec<f64>) -> Result<Self, ValidationError> {
        if names.len() != values.len() {
            return Err(ValidationError::ArityMismatch {
                expected: names.len(),
                actual: values.len(),
            });
        }
        Ok(Self { names, values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Anything that maps a feature vector onto class probabilities.
///
/// Implementations must be pure: the same input yields bit-identical output.
pub trait ProbabilisticClassifier: Send + Sync {
    fn n_classes(&self) -> usize;

    /// Class probabilities for one row, summing to 1.
    fn predict_proba(&self, features: &[f64]) -> Vec<f64>;
}

/// Classifier decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: usize,
    pub score: f64,
}

impl Prediction {
    /// Arg-max over a probability vector; the first maximum wins ties.
    /// Returns `None` for an empty vector or when every entry is NaN.
    pub fn from_probabilities(probabilities: &[f64]) -> Option<Self> {
        let mut best: Option<(usize, f64)> = None;
        for (label, &p) in probabilities.iter().enumerate() {
            if p.is_nan() {
                continue;
            }
            match best {
                Some((_, score)) if p <= score => {}
                _ => best = Some((label, p)),
            }
        }
        best.map(|(label, score)| Self { label, score: score.clamp(0.0, 1.0) })
    }
}

/// Raw anomaly decision value, folded into a bounded range for reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierScore {
    raw: f64,
}

impl OutlierScore {
    pub fn from_raw(raw: f64) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> f64 {
        self.raw
    }

    /// `max(-2, raw / 2)`.
    pub fn reported(&self) -> f64 {
        (self.raw / 2.0).max(OUTLIER_LOWER_BOUND)
    }

    /// Reported value shifted into histogram range.
    pub fn histogram_value(&self) -> f64 {
        self.reported() + OUTLIER_HISTOGRAM_SHIFT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub characteristic: String,
    pub contribution: f64,
}

/// Local surrogate explanation of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Ordered by descending absolute contribution.
    pub contributions: Vec<Contribution>,
    /// Class whose probability the surrogate approximates.
    pub explained_class: usize,
    pub intercept: f64,
    /// Surrogate prediction at the instance itself.
    pub local_prediction: f64,
    /// Weighted R² of the surrogate on the sampled neighborhood.
    pub score: f64,
}

/// Per-feature drift p-values and the combined verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftTestResult {
    pub p_values: Vec<f64>,
    pub threshold: f64,
    pub drift: bool,
}

impl DriftTestResult {
    /// Apply the Bonferroni-corrected threshold to a set of p-values.
    pub fn from_p_values(p_values: Vec<f64>, global_p_value: f64) -> Self {
        let threshold = if p_values.is_empty() {
            global_p_value
        } else {
            global_p_value / p_values.len() as f64
        };
        let drift = p_values.iter().any(|&p| p < threshold);
        Self { p_values, threshold, drift }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prediction_takes_first_maximum() {
        let p = Prediction::from_probabilities(&[0.2, 0.4, 0.4]).unwrap();
        assert_eq!(p.label, 1);
        assert_eq!(p.score, 0.4);
        assert!(Prediction::from_probabilities(&[]).is_none());
        assert!(Prediction::from_probabilities(&[f64::NAN]).is_none());
    }

    #[test]
    fn feature_vector_checks_arity() {
        let names: Arc<[String]> = vec!["a".to_string(), "b".to_string()].into();
        assert!(FeatureVector::new(names.clone(), vec![1.0, 2.0]).is_ok());
        assert_eq!(
            FeatureVector::new(names, vec![1.0]).unwrap_err(),
            ValidationError::ArityMismatch { expected: 2, actual: 1 }
        );
    }

    #[test]
    fn outlier_folding() {
        assert_eq!(OutlierScore::from_raw(0.4).reported(), 0.2);
        assert_eq!(OutlierScore::from_raw(-10.0).reported(), -2.0);
        assert_eq!(OutlierScore::from_raw(0.0).histogram_value(), 1.0);
        assert_eq!(OutlierScore::from_raw(-100.0).histogram_value(), -1.0);
    }

    #[test]
    fn bonferroni_threshold() {
        let result = DriftTestResult::from_p_values(vec![0.3, 0.2, 0.9, 0.5, 0.4], 0.5);
        assert_eq!(result.threshold, 0.1);
        assert!(!result.drift);

        let result = DriftTestResult::from_p_values(vec![0.3, 0.05], 0.5);
        assert!(result.drift);
    }

    proptest! {
        #[test]
        fn prop_outlier_reported_is_clamped(raw in -1.0e6f64..1.0e6f64) {
            let score = OutlierScore::from_raw(raw);
            prop_assert!(score.reported() >= OUTLIER_LOWER_BOUND);
            prop_assert_eq!(score.histogram_value(), score.reported() + OUTLIER_HISTOGRAM_SHIFT);
        }

        #[test]
        fn prop_prediction_matches_argmax(probs in proptest::collection::vec(0.0f64..1.0, 1..8)) {
            let p = Prediction::from_probabilities(&probs).unwrap();
            let max = probs.iter().cloned().fold(f64::MIN, f64::max);
            prop_assert_eq!(p.score, max);
            prop_assert_eq!(probs[p.label], max);
            prop_assert!(probs[..p.label].iter().all(|&q| q < max));
        }
    }
}
