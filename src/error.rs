use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::desktop::BuildError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Host error: {0}")]
    Host(#[from] crate::desktop::HostError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<BuildError> for AppError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::PermissionDenied { .. } => AppError::PermissionDenied(e.to_string()),
            BuildError::Timeout { .. } => AppError::Timeout(e.to_string()),
            BuildError::Join(_) => AppError::Internal(anyhow::anyhow!(e)),
            _ => AppError::NotFound(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Timeout"),
            AppError::Host(_) => (StatusCode::BAD_GATEWAY, "Host Error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
