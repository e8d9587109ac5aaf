//! HTTP error mapping

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lookout_common::{LookoutError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Application error types
#[derive(Debug)]
pub enum ApiError {
    Lookout(LookoutError),
    Body(JsonRejection),
}

impl From<LookoutError> for ApiError {
    fn from(error: LookoutError) -> Self {
        ApiError::Lookout(error)
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::Lookout(error.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

fn validation_details(error: &ValidationError) -> Option<Value> {
    match error {
        ValidationError::MissingField(field) | ValidationError::UnsupportedValue(field) => {
            Some(json!({ "field": field }))
        }
        ValidationError::NotNumeric { field, value } => {
            Some(json!({ "field": field, "value": value }))
        }
        ValidationError::ArityMismatch { expected, actual } => {
            Some(json!({ "expected": expected, "actual": actual }))
        }
        ValidationError::NotAnObject | ValidationError::EmptyBatch => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Lookout(LookoutError::Validation(error)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: error.to_string(),
                    error_code: error.code().to_string(),
                    details: validation_details(&error),
                },
            ),
            ApiError::Lookout(LookoutError::NotConfigured(what)) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: format!("{what} is not configured"),
                    error_code: "NOT_CONFIGURED".to_string(),
                    details: None,
                },
            ),
            ApiError::Lookout(error) => {
                tracing::error!(error = %error, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: error.to_string(),
                        error_code: "INTERNAL_ERROR".to_string(),
                        details: None,
                    },
                )
            }
            ApiError::Body(rejection) => (
                rejection.status(),
                ErrorResponse {
                    error: rejection.body_text(),
                    error_code: "INVALID_BODY".to_string(),
                    details: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
