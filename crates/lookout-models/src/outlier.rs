//! Outlier scoring with a fitted one-class SVM.

use lookout_common::{ArtifactError, FeatureVector, OutlierScore};
use serde::{Deserialize, Serialize};

/// RBF one-class SVM preceded by a standard scaler.
///
/// `decision(x) = sum_i dual_coef[i] * exp(-gamma * |sv_i - z|^2) + intercept`
/// where `z = (x - mean) / scale`. Positive values are inliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneClassSvm {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub gamma: f64,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
}

impl OneClassSvm {
    pub fn validate(&self, arity: usize) -> Result<(), ArtifactError> {
        if self.mean.len() != arity || self.scale.len() != arity {
            return Err(ArtifactError::Invalid(format!(
                "outlier scaler has {}/{} entries, transformer produces {arity}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.support_vectors.is_empty() {
            return Err(ArtifactError::Invalid("outlier detector has no support vectors".into()));
        }
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(ArtifactError::Invalid(format!(
                "outlier detector has {} support vectors but {} dual coefficients",
                self.support_vectors.len(),
                self.dual_coef.len()
            )));
        }
        if self.support_vectors.iter().any(|sv| sv.len() != arity) {
            return Err(ArtifactError::Invalid(
                "outlier support vector length differs from transformer arity".into(),
            ));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(ArtifactError::Invalid(format!("invalid RBF gamma {}", self.gamma)));
        }
        Ok(())
    }

    pub fn decision_function(&self, features: &[f64]) -> f64 {
        let scaled: Vec<f64> = features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
            .collect();

        let kernel_sum: f64 = self
            .support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, alpha)| {
                let dist2: f64 = sv.iter().zip(&scaled).map(|(a, b)| (a - b) * (a - b)).sum();
                alpha * (-self.gamma * dist2).exp()
            })
            .sum();

        kernel_sum + self.intercept
    }
}

/// Scores feature vectors; read-only after load.
#[derive(Debug, Clone)]
pub struct OutlierScorer {
    detector: OneClassSvm,
}

impl OutlierScorer {
    pub fn new(detector: OneClassSvm, arity: usize) -> Result<Self, ArtifactError> {
        detector.validate(arity)?;
        Ok(Self { detector })
    }

    pub fn score(&self, vector: &FeatureVector) -> OutlierScore {
        OutlierScore::from_raw(self.detector.decision_function(vector.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn detector() -> OneClassSvm {
        OneClassSvm {
            mean: vec![10.0, 0.0],
            scale: vec![5.0, 0.0],
            gamma: 0.5,
            support_vectors: vec![vec![0.0, 0.0], vec![1.0, 0.0]],
            dual_coef: vec![0.6, 0.4],
            intercept: -0.5,
        }
    }

    fn vector(values: Vec<f64>) -> FeatureVector {
        let names: Arc<[String]> = vec!["fare".to_string(), "sibsp".to_string()].into();
        FeatureVector::new(names, values).unwrap()
    }

    #[test]
    fn decision_is_high_near_support_and_low_far_away() {
        let scorer = OutlierScorer::new(detector(), 2).unwrap();
        let inlier = scorer.score(&vector(vec![10.0, 0.0]));
        let outlier = scorer.score(&vector(vec![500.0, 9.0]));

        // At the first support vector: 0.6 + 0.4 * exp(-0.5) - 0.5
        let expected = 0.6 + 0.4 * (-0.5f64).exp() - 0.5;
        assert!((inlier.raw() - expected).abs() < 1e-12);
        assert!(inlier.raw() > 0.0);
        assert!(outlier.raw() < 0.0);
        assert!(outlier.reported() >= -2.0);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        assert!(OutlierScorer::new(detector(), 3).is_err());

        let mut bad = detector();
        bad.dual_coef.pop();
        assert!(OutlierScorer::new(bad, 2).is_err());

        let mut bad = detector();
        bad.gamma = 0.0;
        assert!(bad.validate(2).is_err());
    }
}
