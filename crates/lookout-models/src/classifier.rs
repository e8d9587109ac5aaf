//! Classifier artifacts.
//!
//! Two families are supported: (multinomial) logistic regression and
//! gradient boosted regression trees with a logistic link, matching the
//! models the training side exports.

use lookout_common::{ArtifactError, Prediction, ProbabilisticClassifier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Logistic(LogisticRegression),
    GradientBoosting(GradientBoostedTrees),
}

impl Classifier {
    /// Check the parameters against the transformer arity.
    pub fn validate(&self, arity: usize) -> Result<(), ArtifactError> {
        match self {
            Classifier::Logistic(model) => model.validate(arity),
            Classifier::GradientBoosting(model) => model.validate(arity),
        }
    }

    pub fn predict(&self, features: &[f64]) -> Option<Prediction> {
        Prediction::from_probabilities(&self.predict_proba(features))
    }
}

impl ProbabilisticClassifier for Classifier {
    fn n_classes(&self) -> usize {
        match self {
            Classifier::Logistic(model) => model.n_classes(),
            Classifier::GradientBoosting(model) => model.n_classes(),
        }
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        match self {
            Classifier::Logistic(model) => model.predict_proba(features),
            Classifier::GradientBoosting(model) => model.predict_proba(features),
        }
    }
}

/// One coefficient row per class, or a single row for a binary model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogisticRegression {
    fn n_classes(&self) -> usize {
        if self.coefficients.len() == 1 { 2 } else { self.coefficients.len() }
    }

    fn validate(&self, arity: usize) -> Result<(), ArtifactError> {
        if self.coefficients.is_empty() {
            return Err(ArtifactError::Invalid("logistic model has no coefficient rows".into()));
        }
        if self.coefficients.len() != self.intercepts.len() {
            return Err(ArtifactError::Invalid(format!(
                "logistic model has {} coefficient rows but {} intercepts",
                self.coefficients.len(),
                self.intercepts.len()
            )));
        }
        if let Some(row) = self.coefficients.iter().find(|row| row.len() != arity) {
            return Err(ArtifactError::Invalid(format!(
                "logistic coefficient row has {} entries, transformer produces {arity}",
                row.len()
            )));
        }
        Ok(())
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| dot(row, features) + b)
            .collect();
        link(&logits)
    }
}

/// Additive ensemble: `raw_k = init_k + learning_rate * sum(stage[k](x))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub learning_rate: f64,
    /// One entry for binary models, one per class otherwise.
    pub init: Vec<f64>,
    /// Each stage holds one tree per entry of `init`.
    pub stages: Vec<Vec<RegressionTree>>,
}

impl GradientBoostedTrees {
    fn n_classes(&self) -> usize {
        if self.init.len() == 1 { 2 } else { self.init.len() }
    }

    fn validate(&self, arity: usize) -> Result<(), ArtifactError> {
        if self.init.is_empty() {
            return Err(ArtifactError::Invalid("boosted model has an empty init vector".into()));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.len() != self.init.len() {
                return Err(ArtifactError::Invalid(format!(
                    "boosting stage {i} has {} trees, expected {}",
                    stage.len(),
                    self.init.len()
                )));
            }
            for tree in stage {
                tree.validate(arity)?;
            }
        }
        Ok(())
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut raw = self.init.clone();
        for stage in &self.stages {
            for (k, tree) in stage.iter().enumerate() {
                raw[k] += self.learning_rate * tree.evaluate(features);
            }
        }
        link(&raw)
    }
}

/// Flat node array; node 0 is the root. Rows go left when
/// `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { value: f64 },
}

impl RegressionTree {
    fn validate(&self, arity: usize) -> Result<(), ArtifactError> {
        if self.nodes.is_empty() {
            return Err(ArtifactError::Invalid("regression tree has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { feature, left, right, .. } = *node {
                if feature >= arity {
                    return Err(ArtifactError::Invalid(format!(
                        "tree node {i} splits on feature {feature}, transformer produces {arity}"
                    )));
                }
                // Children always point forward, so evaluation terminates.
                for child in [left, right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(ArtifactError::Invalid(format!(
                            "tree node {i} has invalid child index {child}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split { feature, threshold, left, right } => {
                    index = if features[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Sigmoid for a single decision value, softmax otherwise.
fn link(raw: &[f64]) -> Vec<f64> {
    if raw.len() == 1 {
        let p = sigmoid(raw[0]);
        return vec![1.0 - p, p];
    }
    let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = raw.iter().map(|r| (r - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
