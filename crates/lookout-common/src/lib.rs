//! Common types, traits, and utilities for the Lookout serving gateway
//!
//! This crate provides the foundational types shared by the transformer,
//! classifier, explainer, drift detector and HTTP server crates: the request
//! data model, the declared feature schema, the typed response signal and the
//! error taxonomy.

pub mod artifact;
pub mod error;
pub mod record;
pub mod schema;
pub mod signal;
pub mod types;

pub use artifact::{check_schema_version, load_json_artifact};
pub use error::{ArtifactError, LookoutError, Result, ValidationError};
pub use record::{FeatureRecord, RawValue};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec, MISSING_CATEGORY};
pub use signal::ModelSignal;
pub use types::{
    Contribution, DriftTestResult, Explanation, FeatureVector, OUTLIER_HISTOGRAM_SHIFT,
    OUTLIER_LOWER_BOUND, OutlierScore, Prediction, ProbabilisticClassifier,
};
