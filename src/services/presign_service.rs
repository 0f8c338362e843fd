//! Phase one of an upload session: hand out one presigned PUT URL per file.
//!
//! Nothing is written to the database here, so a client that abandons the
//! session after this phase leaves no trace server-side.

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use super::{
    error::{UploadError, UploadResult},
    object_key,
    object_storage::ObjectStorageGateway,
    rate_limiter::RateLimiter,
    retry::RetryPolicy,
    validation,
};
use crate::{
    config::UploadSettings,
    models::upload::{FileDescriptor, PresignedEntry, PresignedUrlResult},
};

pub const PRESIGN_OPERATION: &str = "presign";

#[derive(Clone)]
pub struct PresignedUrlIssuer {
    db: Arc<SqlitePool>,
    gateway: Arc<dyn ObjectStorageGateway>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    settings: Arc<UploadSettings>,
}

impl PresignedUrlIssuer {
    pub fn new(
        db: Arc<SqlitePool>,
        gateway: Arc<dyn ObjectStorageGateway>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        settings: Arc<UploadSettings>,
    ) -> Self {
        Self {
            db,
            gateway,
            limiter,
            retry,
            settings,
        }
    }

    /// Validate the batch, gate on principal existence and rate limit, then
    /// presign every file in input order.
    #[tracing::instrument(skip(self, files), fields(count = files.len()))]
    pub async fn request_urls(
        &self,
        files: &[FileDescriptor],
        principal: &str,
    ) -> UploadResult<PresignedUrlResult> {
        validation::batch_len(files.len(), &self.settings)?;
        for file in files {
            validation::file(
                &file.original_filename,
                &file.mime_type,
                file.file_size,
                &self.settings,
            )?;
        }
        validation::principal(principal)?;

        if !user_exists(&self.db, principal).await? {
            return Err(UploadError::validation("user does not exist"));
        }

        self.limiter
            .check_and_increment(
                principal,
                self.settings.presign_rate_limit,
                self.settings.presign_rate_window,
                PRESIGN_OPERATION,
            )
            .map_err(|e| UploadError::RateLimited {
                operation: e.operation,
                minutes_remaining: e.minutes_remaining,
                retry_after_secs: e.retry_after_secs,
            })?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let key = object_key::generate(
                &self.settings.key_folder,
                principal,
                &file.original_filename,
            );
            let upload_url = self
                .retry
                .execute("presign_upload", || {
                    self.gateway
                        .presign_upload(&key, &file.mime_type, self.settings.upload_url_ttl)
                })
                .await?;

            entries.push(PresignedEntry {
                s3_key: key,
                upload_url,
                original_filename: file.original_filename.clone(),
                file_size: file.file_size,
                mime_type: file.mime_type.clone(),
            });
        }

        let session_id = Uuid::new_v4();
        tracing::info!(%session_id, principal, files = entries.len(), "issued presigned upload URLs");

        Ok(PresignedUrlResult {
            session_id,
            pre_signed_data: entries,
            expires_in: self.settings.upload_url_ttl.as_secs(),
        })
    }
}

/// Indexed existence read on `users`.
pub(crate) async fn user_exists(db: &SqlitePool, principal: &str) -> UploadResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(principal)
        .fetch_one(db)
        .await?;
    Ok(exists)
}
