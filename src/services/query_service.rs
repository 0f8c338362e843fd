//! Read-side views: the caller's uploads, publicly visible resources and
//! time-bound download URLs for owned uploads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{
    error::{UploadError, UploadResult},
    object_storage::ObjectStorageGateway,
    resource_service::UPLOAD_COLUMNS,
    retry::RetryPolicy,
};
use crate::{
    config::UploadSettings,
    models::{ModerationStatus, Resource, UploadRecord, UploadStatus, Visibility},
};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    /// Clamp to `page >= 1` and `1 <= limit <= 100`.
    pub fn normalize(self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrl {
    pub download_url: String,
    pub file_name: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct UploadQueries {
    db: Arc<SqlitePool>,
    gateway: Arc<dyn ObjectStorageGateway>,
    retry: RetryPolicy,
    settings: Arc<UploadSettings>,
}

impl UploadQueries {
    pub fn new(
        db: Arc<SqlitePool>,
        gateway: Arc<dyn ObjectStorageGateway>,
        retry: RetryPolicy,
        settings: Arc<UploadSettings>,
    ) -> Self {
        Self {
            db,
            gateway,
            retry,
            settings,
        }
    }

    /// The principal's uploads, newest first.
    pub async fn my_uploads(&self, principal: &str, params: PageParams) -> UploadResult<Page<UploadRecord>> {
        let (page, limit) = params.normalize();
        let offset = i64::from(page - 1) * i64::from(limit);

        let items = sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE owner_user_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(principal)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&*self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM uploads WHERE owner_user_id = ?")
            .bind(principal)
            .fetch_one(&*self.db)
            .await?;

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Public resources with at least one completed and approved upload.
    pub async fn public_resources(&self, params: PageParams) -> UploadResult<Page<Resource>> {
        let (page, limit) = params.normalize();
        let offset = i64::from(page - 1) * i64::from(limit);

        const VISIBLE: &str = "FROM resources r
             WHERE r.visibility = ?
               AND EXISTS (
                   SELECT 1 FROM uploads u
                   WHERE u.resource_id = r.id AND u.status = ? AND u.moderation_status = ?
               )";

        let items = sqlx::query_as::<_, Resource>(&format!(
            "SELECT r.id, r.title, r.description, r.category, r.visibility, r.created_at {VISIBLE}
             ORDER BY r.created_at DESC, r.rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(Visibility::Public)
        .bind(UploadStatus::Completed)
        .bind(ModerationStatus::Approved)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&*self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {VISIBLE}"))
            .bind(Visibility::Public)
            .bind(UploadStatus::Completed)
            .bind(ModerationStatus::Approved)
            .fetch_one(&*self.db)
            .await?;

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Time-bound download URL for an upload owned by `principal`.
    ///
    /// Uploads owned by someone else are reported as missing.
    #[tracing::instrument(skip(self))]
    pub async fn download_url(&self, upload_id: Uuid, principal: &str) -> UploadResult<DownloadUrl> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT object_key, file_name FROM uploads WHERE id = ? AND owner_user_id = ?",
        )
        .bind(upload_id)
        .bind(principal)
        .fetch_optional(&*self.db)
        .await?;

        let (key, file_name) =
            row.ok_or_else(|| UploadError::NotFound(format!("upload {}", upload_id)))?;

        let ttl = self.settings.download_url_ttl;
        let download_url = self
            .retry
            .execute("presign_download", || self.gateway.presign_download(&key, ttl))
            .await?;

        Ok(DownloadUrl {
            download_url,
            file_name,
            expires_in: ttl.as_secs(),
        })
    }
}
