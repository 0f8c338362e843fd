//! Represents a single uploaded file and the ephemeral shapes of the presign
//! phase.

use super::resource::Visibility;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Transfer state of an uploaded file.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    Completed,
    Failed,
}

/// Approval workflow state gating public visibility.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    PendingApproval,
    Approved,
    Rejected,
}

/// One row per physical file stored in the object store.
///
/// `object_key` is unique and immutable once written; it always embeds the
/// owner id as the prefix of its second path segment.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    /// Unique identifier for this upload.
    pub id: Uuid,

    /// Principal that uploaded the file.
    pub owner_user_id: String,

    /// Resource the file belongs to.
    pub resource_id: Uuid,

    /// Original filename supplied by the client.
    pub file_name: String,

    /// Content type (MIME type).
    pub mime_type: String,

    /// Size in bytes as declared by the client.
    pub file_size_bytes: i64,

    /// Object key in the storage service.
    pub object_key: String,

    /// Optional per-file title.
    pub title: Option<String>,

    /// Optional per-file description.
    pub description: Option<String>,

    /// Per-file visibility.
    pub visibility: Visibility,

    /// Transfer state.
    pub status: UploadStatus,

    /// Moderation state.
    pub moderation_status: ModerationStatus,

    /// When the row was written.
    pub created_at: DateTime<Utc>,

    /// When the client confirmed storage-side completion, if ever.
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// File metadata submitted when requesting presigned URLs.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub original_filename: String,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    pub file_size: i64,
}

/// One presigned upload target, returned in input order.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PresignedEntry {
    pub s3_key: String,
    pub upload_url: String,
    pub original_filename: String,
    pub file_size: i64,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
}

/// Result of the presign phase. Nothing here is persisted.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResult {
    /// Opaque correlation token; not a database key.
    pub session_id: Uuid,
    pub pre_signed_data: Vec<PresignedEntry>,
    /// Lifetime of every URL in this result, in seconds.
    pub expires_in: u64,
}
