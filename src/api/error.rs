use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::utils::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Server accepts only {expected} type")]
    UnsupportedMediaType { expected: String },

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("No file provided")]
    NoFile,

    #[error("File already exists: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BadRequest(_) | AppError::NoFile => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UnsupportedMediaType { .. } => "INVALID_FILE_TYPE",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NoFile => "NO_FILE",
            AppError::Conflict(_) => "FILE_EXISTS",
            AppError::Io(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err.code {
            "FILE_TOO_LARGE" => AppError::PayloadTooLarge(err.message),
            _ => AppError::BadRequest(err.message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Io(e) => {
                tracing::error!("I/O error: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::PayloadTooLarge(msg) | AppError::BadRequest(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "code": self.code(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
            "statusCode": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
