use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const INTERNAL_MESSAGE: &str = "Failed to generate image. Please try again later.";
pub const UNAUTHENTICATED_MESSAGE: &str = "User must be authenticated to generate images.";

/// Failures surfaced to the caller. Anything that is not one of the first three
/// variants collapses into `Internal` with a fixed message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("unauthenticated: {0}")] Unauthenticated(String),
    #[error("invalid argument: {0}")] InvalidArgument(String),
    #[error("not found: {0}")] NotFound(String),
    #[error("internal: {0}")] Internal(String),
}

impl PipelineError {
    /// Logs the underlying cause and returns the generic internal failure.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!("❌ Error generating image: {}", cause);
        PipelineError::Internal(INTERNAL_MESSAGE.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            PipelineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            PipelineError::Unauthenticated(_) => "UNAUTHENTICATED",
            PipelineError::InvalidArgument(_) => "INVALID_ARGUMENT",
            PipelineError::NotFound(_) => "NOT_FOUND",
            PipelineError::Internal(_) => "INTERNAL",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PipelineError::Unauthenticated(m)
            | PipelineError::InvalidArgument(m)
            | PipelineError::NotFound(m)
            | PipelineError::Internal(m) => m,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "status": self.status_name(),
                "message": self.message(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

/// Errors from the object and document store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")] Io(#[from] std::io::Error),
    #[error("serialization error: {0}")] Serde(#[from] serde_json::Error),
    #[error("object already exists: {0}")] AlreadyExists(String),
    #[error("object not found: {0}")] NotFound(String),
    #[error("invalid key: {0}")] InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_hides_the_cause() {
        let err = PipelineError::internal("bucket exploded: secret detail");
        assert_eq!(err, PipelineError::Internal(INTERNAL_MESSAGE.to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(PipelineError::Unauthenticated("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(PipelineError::InvalidArgument("x".into()).status_name(), "INVALID_ARGUMENT");
        assert_eq!(PipelineError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    }
}
