use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::llm_client::retry::ModelFailure;
use crate::report::ReportError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Model timeout: {0}")]
    ModelTimeout(String),

    #[error("Model protocol error: {0}")]
    ModelProtocol(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        AppError::Extraction(err.to_string())
    }
}

impl From<ModelFailure> for AppError {
    fn from(failure: ModelFailure) -> Self {
        match failure {
            ModelFailure::Unavailable { .. } => AppError::ModelTimeout(failure.to_string()),
            ModelFailure::Protocol { .. } => AppError::ModelProtocol(failure.to_string()),
        }
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Extraction(msg) => (StatusCode::BAD_REQUEST, "EXTRACTION_ERROR", msg.clone()),
            AppError::ModelTimeout(msg) => {
                tracing::error!("Model unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "MODEL_UNAVAILABLE",
                    "The language model did not respond in time".to_string(),
                )
            }
            AppError::ModelProtocol(msg) => {
                tracing::error!("Model protocol error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MODEL_ERROR",
                    "The language model returned an unusable reply".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
