//! Local explanations for tabular classifiers
//!
//! An instance is explained by sampling a synthetic neighborhood in
//! discretized feature space, querying the classifier on every neighbor and
//! fitting a proximity-weighted ridge regression whose coefficients become the
//! per-feature contributions.

pub mod discretizer;
pub mod explainer;
pub mod surrogate;

pub use discretizer::{BinStatistics, FeatureStatistics};
pub use explainer::{ExplainSettings, ExplainerArtifact, LocalExplainer};
pub use surrogate::{RidgeFit, SurrogateError, weighted_ridge};
