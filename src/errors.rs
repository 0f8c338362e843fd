use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::UploadError;

const TRY_AGAIN_LATER: &str = "The upload service is temporarily unavailable, please try again later";

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Seconds for the `Retry-After` header on 429 responses.
    pub retry_after: Option<u64>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            retry_after: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(msg) => AppError::bad_request(msg),
            UploadError::RateLimited {
                minutes_remaining,
                retry_after_secs,
                ..
            } => AppError {
                retry_after: Some(retry_after_secs),
                ..AppError::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    format!(
                        "Too many upload requests. Please try again in {} minute(s).",
                        minutes_remaining
                    ),
                )
            },
            UploadError::Ownership(msg) => AppError::new(StatusCode::FORBIDDEN, msg),
            err @ UploadError::Unauthorized(_) => AppError::new(StatusCode::FORBIDDEN, err.to_string()),
            err @ UploadError::NotFound(_) => AppError::new(StatusCode::NOT_FOUND, err.to_string()),
            UploadError::Conflict(msg) => AppError::new(StatusCode::CONFLICT, msg),
            err @ (UploadError::StorageUnavailable(_) | UploadError::TransactionTimeout(_)) => {
                tracing::error!(error = %err, "upload request failed on a transient dependency");
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, TRY_AGAIN_LATER)
            }
            UploadError::Database(err) => {
                tracing::error!(error = %err, "upload request failed on the database");
                AppError::internal(TRY_AGAIN_LATER)
            }
        }
    }
}
