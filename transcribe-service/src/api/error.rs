//! HTTP-layer error translation (`spec.md` §7).
//!
//! Grounded on the teacher's `api::error::ApiError`/`ApiErrorResponse` pair,
//! narrowed to the four outcomes this service's handlers actually produce:
//! 400 validation, 401 admin auth, 404 missing job, 500 unexpected.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::Error;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation_error",
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "auth_error",
            message: "missing or invalid admin credential".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Unexpected errors are logged with full detail and returned to the client
/// as a plain, non-leaking 500 (`spec.md` §7).
impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(id) => ApiError::not_found(format!("job '{id}' not found")),
            Error::Validation(msg) => ApiError::bad_request(msg),
            Error::Duplicate(id) => ApiError::bad_request(format!("job '{id}' already exists")),
            other => {
                tracing::error!(error = %other, "unexpected error handling request");
                ApiError::internal("an unexpected error occurred")
            }
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
