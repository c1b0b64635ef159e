//! Error responses for the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use controlmap::error::{ArchiveError, ControlMapError, ProcessError, ValidationError};

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ControlMapError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Service(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Service(e) => match e {
                ControlMapError::Validation(ValidationError::FileTooLarge { .. }) => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                ControlMapError::Validation(_) => StatusCode::BAD_REQUEST,
                ControlMapError::Process(ProcessError::ReadDocument { .. }) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                ControlMapError::Process(_) => StatusCode::BAD_REQUEST,
                ControlMapError::NotFound { .. } => StatusCode::NOT_FOUND,
                ControlMapError::Archive(ArchiveError::NoCompletedJobs) => StatusCode::NOT_FOUND,
                ControlMapError::Archive(ArchiveError::BatchRunning(_)) => StatusCode::CONFLICT,
                ControlMapError::Conflict(_) | ControlMapError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", self);
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
