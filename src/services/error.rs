//! Error taxonomy shared by every phase of the upload pipeline.

use super::object_storage::GatewayError;
use super::retry::Retryable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),
    #[error("too many requests for `{operation}`, try again in {minutes_remaining} minute(s)")]
    RateLimited {
        operation: String,
        minutes_remaining: u64,
        retry_after_secs: u64,
    },
    #[error("{0}")]
    Ownership(String),
    #[error("not authorized to delete `{0}`")]
    Unauthorized(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("storage service unavailable: {0}")]
    StorageUnavailable(String),
    #[error("transaction exceeded its {0} budget")]
    TransactionTimeout(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl Retryable for UploadError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::TransactionTimeout(_) | Self::Database(_)
        )
    }
}

impl From<GatewayError> for UploadError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidKey(key) => {
                UploadError::Validation(format!("invalid object key `{key}`"))
            }
            other => UploadError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
