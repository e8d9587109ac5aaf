//! Error taxonomy shared across the workspace.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or incomplete client input. Surfaced as a client error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("required field missing: {0}")]
    MissingField(String),

    #[error("field '{field}' is not numeric: {value:?}")]
    NotNumeric { field: String, value: String },

    #[error("field '{0}' holds a nested value; only scalars are accepted")]
    UnsupportedValue(String),

    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("feature vector has {actual} values, expected {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("batch is empty")]
    EmptyBatch,
}

impl ValidationError {
    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "MISSING_FIELD",
            ValidationError::NotNumeric { .. } => "INVALID_FIELD_VALUE",
            ValidationError::UnsupportedValue(_) => "UNSUPPORTED_VALUE",
            ValidationError::NotAnObject => "INVALID_BODY",
            ValidationError::ArityMismatch { .. } => "ARITY_MISMATCH",
            ValidationError::EmptyBatch => "EMPTY_BATCH",
        }
    }
}

/// Failure to load or validate a serialized artifact at startup.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact: {0}")]
    Invalid(String),

    #[error("artifact built for schema {actual}, model schema is {expected}")]
    SchemaMismatch { expected: String, actual: String },
}

/// Umbrella error returned by request-level operations.
#[derive(Debug, Error)]
pub enum LookoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LookoutError>;
