use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::upload::UploadError;

/// Generic message for anything that went wrong on our side.
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong!";

// ============================================================================
// Success envelope
// ============================================================================

/// `{"success": true, ...body}`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Success<T> {
    pub fn json(body: T) -> Json<Success<T>> {
        Json(Success {
            success: true,
            body,
        })
    }
}

// ============================================================================
// Error envelope
// ============================================================================

/// `{"error": message}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error: a client mistake (4xx) or a server failure (5xx).
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Error(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Fail(code, msg) => (code, msg),
            ApiError::Error(code, msg) => (code, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Fail(code, _) | ApiError::Error(code, _) => *code,
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        if e.is_client_error() {
            return ApiError::bad_request(e.to_string());
        }

        match e {
            // Messages of these two carry no internal detail.
            UploadError::StorageWriteFailed(ref source)
            | UploadError::StorageReadFailed(ref source) => {
                tracing::error!(error = %source, "{e}");
                ApiError::internal(e.to_string())
            }
            _ => {
                tracing::error!(error = %e, "Upload failed");
                ApiError::internal(INTERNAL_ERROR_MESSAGE)
            }
        }
    }
}

/// Response for a panicking handler.
pub fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::internal(INTERNAL_ERROR_MESSAGE).into_response()
}
