use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use framechain_core::error::CoreError;
use framechain_db::StoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `framechain_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Core(err.into())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

fn internal(message: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %message, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::InvalidSegmentIndex { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_SEGMENT_INDEX", core.to_string())
                }
                CoreError::SeedMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "SEED_MISMATCH", core.to_string())
                }
                CoreError::PreviousSegmentIncomplete { .. } => (
                    StatusCode::CONFLICT,
                    "PREVIOUS_SEGMENT_INCOMPLETE",
                    core.to_string(),
                ),
                CoreError::JobFailed(_) => (StatusCode::CONFLICT, "JOB_FAILED", core.to_string()),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Cancelled { .. } => (StatusCode::CONFLICT, "CANCELLED", core.to_string()),
                CoreError::SegmentGenerationFailed { .. } => (
                    StatusCode::BAD_GATEWAY,
                    "SEGMENT_GENERATION_FAILED",
                    core.to_string(),
                ),
                CoreError::TaskUnavailable { .. } => {
                    (StatusCode::BAD_GATEWAY, "TASK_UNAVAILABLE", core.to_string())
                }
                CoreError::Timeout { .. } => {
                    (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", core.to_string())
                }
                CoreError::FrameExtraction(msg) => {
                    tracing::error!(error = %msg, "Frame extraction error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "FRAME_EXTRACTION_FAILED",
                        "Failed to extract the last frame of the segment".to_string(),
                    )
                }
                CoreError::Internal(msg) => internal(msg),
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
