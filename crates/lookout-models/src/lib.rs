//! Model artifacts for the Lookout serving gateway
//!
//! - [`transformer`]: raw record to feature vector, driven by the declared schema
//! - [`classifier`]: logistic and gradient boosted tree classifiers
//! - [`outlier`]: one-class SVM anomaly scorer
//! - [`artifact`]: on-disk formats and loaders

pub mod artifact;
pub mod classifier;
pub mod outlier;
pub mod transformer;

pub use artifact::{ModelArtifact, OutlierArtifact};
pub use classifier::{
    Classifier, GradientBoostedTrees, LogisticRegression, RegressionTree, TreeNode,
};
pub use outlier::{OneClassSvm, OutlierScorer};
pub use transformer::FeatureTransformer;
