use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

use crate::store::StoreError;

/// The primary error type for the HTTP layer.
///
/// Core [`StoreError`]s are converted into one of these variants, each of which
/// maps onto a status code and a stable error code in the JSON body.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a requested image is not found.
    NotFound(String),
    /// For lookups against a store without members.
    EmptyStore(String),
    /// For when a name is already taken in the store.
    Conflict(String),
    /// For when the store or the recognition backend is temporarily unavailable.
    ServiceUnavailable(String),
    /// For when user input is invalid.
    InvalidInput(String),
    /// For uploads that cannot be decoded or re-encoded.
    DecodeFailure(String),
    /// For errors reported by the recognition backend.
    Recognition(String),
    /// For a delete-all that left images behind.
    PartialFailure {
        /// Names still present after the operation.
        remaining: Vec<String>,
    },
    /// For when a specific field in a request fails validation.
    ValidationError {
        /// The name of the field that failed validation.
        field: String,
        /// A message describing the validation error.
        message: String,
    },
    /// For errors related to I/O operations.
    IoError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::EmptyStore(msg) => write!(f, "Empty store: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::DecodeFailure(msg) => write!(f, "Decode failure: {}", msg),
            AppError::Recognition(msg) => write!(f, "Recognition error: {}", msg),
            AppError::PartialFailure { remaining } => {
                write!(f, "Partial failure: {} image(s) remain", remaining.len())
            }
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
            AppError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Error ID: {}", error_id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::EmptyStore(msg) => (StatusCode::NOT_FOUND, "EMPTY_STORE", msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None)
            }
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg, None),
            AppError::DecodeFailure(msg) => (StatusCode::BAD_REQUEST, "DECODE_FAILURE", msg, None),
            AppError::Recognition(msg) => {
                tracing::warn!("Recognition error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RECOGNITION_FAILED",
                    "Face recognition failed".to_string(),
                    Some(json!({ "details": msg })),
                )
            }
            AppError::PartialFailure { remaining } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PARTIAL_FAILURE",
                format!("{} image(s) could not be deleted", remaining.len()),
                Some(json!({ "remaining": remaining })),
            ),
            AppError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
            AppError::IoError(msg) => {
                tracing::error!("I/O error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "IO_ERROR",
                    "An I/O error occurred".to_string(),
                    Some(json!({ "details": msg })),
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StoreUnavailable(root) => {
                AppError::ServiceUnavailable(format!("Image store {} is unavailable", root))
            }
            e @ StoreError::NameConflict(_) => AppError::Conflict(e.to_string()),
            e @ StoreError::NotFound(_) => AppError::NotFound(e.to_string()),
            StoreError::PartialFailure { remaining } => AppError::PartialFailure { remaining },
            e @ StoreError::EmptyStore => AppError::EmptyStore(e.to_string()),
            StoreError::RecognitionFailed(msg) => AppError::Recognition(msg),
            e @ StoreError::RecognitionTimeout(_) => AppError::ServiceUnavailable(e.to_string()),
            e @ StoreError::InvalidName(_) => AppError::InvalidInput(e.to_string()),
            StoreError::DecodeFailure(msg) => AppError::DecodeFailure(msg),
            StoreError::Io(e) => e.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(format!("{}: {}", err.kind(), err))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid multipart upload: {}", err.body_text()))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(anyhow::anyhow!("blocking task failed: {}", err))
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// Helpers for validating request parameters before they reach the store.
pub mod validation {
    use super::*;

    use crate::store::MAX_NAME_LENGTH;

    /// Validates an image name given in a query parameter.
    ///
    /// Only checks what can be rejected without knowing the store configuration:
    /// emptiness, null characters and length. Returns the trimmed name.
    pub fn validate_name<'a>(value: &'a str, field: &str) -> AppResult<&'a str> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::ValidationError {
                field: field.to_string(),
                message: "Name cannot be empty".to_string(),
            });
        }

        if trimmed.contains('\0') {
            return Err(AppError::ValidationError {
                field: field.to_string(),
                message: "Name contains null characters".to_string(),
            });
        }

        if trimmed.len() > MAX_NAME_LENGTH {
            return Err(AppError::ValidationError {
                field: field.to_string(),
                message: format!("Name exceeds maximum length of {} bytes", MAX_NAME_LENGTH),
            });
        }

        Ok(trimmed)
    }
}
