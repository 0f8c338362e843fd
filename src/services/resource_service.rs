//! Phase three of an upload session: persist the resource, its folder, the
//! folder link and one upload row per file in a single transaction.
//!
//! The object-store files already exist when this runs. If the transaction
//! fails they stay orphaned until the client deletes them explicitly.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tokio::time::timeout;
use uuid::Uuid;

use super::{
    error::{UploadError, UploadResult, is_unique_violation},
    object_key, validation,
};
use crate::{
    config::UploadSettings,
    models::{Folder, ModerationStatus, Resource, UploadRecord, UploadStatus, Visibility},
};

const MAX_TITLE_LEN: usize = 255;

/// Resource-level fields supplied by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Either an existing folder id or data for a new folder; exactly one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSelection {
    pub folder_id: Option<Uuid>,
    pub new_folder_data: Option<NewFolderData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFolderData {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub classification_level_id: Option<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

/// A file the client has already PUT to storage under `s3_key`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub original_filename: String,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    pub file_size: i64,
    pub s3_key: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResource {
    pub resource: Resource,
    pub uploads: Vec<UploadRecord>,
    pub folder_id: Uuid,
}

enum FolderChoice {
    Existing(Uuid),
    New(NewFolderData),
}

impl FolderSelection {
    fn into_choice(self) -> UploadResult<FolderChoice> {
        match (self.folder_id, self.new_folder_data) {
            (Some(id), None) => Ok(FolderChoice::Existing(id)),
            (None, Some(data)) => {
                if data.name.trim().is_empty() {
                    return Err(UploadError::validation("folder name is required"));
                }
                Ok(FolderChoice::New(data))
            }
            (Some(_), Some(_)) => Err(UploadError::validation(
                "provide either folderId or newFolderData, not both",
            )),
            (None, None) => Err(UploadError::validation(
                "a folder must be selected or created",
            )),
        }
    }
}

/// Transaction context for resource creation. Each method touches exactly
/// the table it names.
pub struct ResourceTx<'c> {
    tx: Transaction<'c, Sqlite>,
}

impl<'c> ResourceTx<'c> {
    pub fn new(tx: Transaction<'c, Sqlite>) -> Self {
        Self { tx }
    }

    /// `resources`: insert one row.
    pub async fn insert_resource(
        &mut self,
        meta: &ResourceMeta,
        now: DateTime<Utc>,
    ) -> UploadResult<Resource> {
        let resource = sqlx::query_as::<_, Resource>(
            "INSERT INTO resources (id, title, description, category, visibility, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id, title, description, category, visibility, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(meta.title.trim())
        .bind(&meta.description)
        .bind(&meta.category)
        .bind(meta.visibility)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(resource)
    }

    /// `folders`: read one row by id.
    pub async fn find_folder(&mut self, folder_id: Uuid) -> UploadResult<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, description, visibility, owner_user_id, classification_level_id, created_at
             FROM folders WHERE id = ?",
        )
        .bind(folder_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(folder)
    }

    /// `folders`: insert one row owned by `owner`.
    pub async fn insert_folder(
        &mut self,
        data: &NewFolderData,
        owner: &str,
        now: DateTime<Utc>,
    ) -> UploadResult<Folder> {
        let folder = sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (id, name, description, visibility, owner_user_id, classification_level_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id, name, description, visibility, owner_user_id, classification_level_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(data.visibility)
        .bind(owner)
        .bind(data.classification_level_id)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(folder)
    }

    /// `folder_tags`: bulk insert, silently skipping pairs that already exist.
    pub async fn insert_folder_tags(&mut self, folder_id: Uuid, tag_ids: &[Uuid]) -> UploadResult<u64> {
        let mut seen = HashSet::new();
        let unique: Vec<Uuid> = tag_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return Ok(0);
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT OR IGNORE INTO folder_tags (folder_id, tag_id) ");
        builder.push_values(&unique, |mut row, tag_id| {
            row.push_bind(folder_id).push_bind(*tag_id);
        });
        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    /// `folder_resources`: insert the link row.
    pub async fn link_folder_resource(&mut self, folder_id: Uuid, resource_id: Uuid) -> UploadResult<()> {
        sqlx::query("INSERT INTO folder_resources (folder_id, resource_id) VALUES (?, ?)")
            .bind(folder_id)
            .bind(resource_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// `uploads`: bulk insert one completed, pending-approval row per file.
    pub async fn insert_uploads(
        &mut self,
        resource: &Resource,
        owner: &str,
        files: &[UploadedFile],
        now: DateTime<Utc>,
    ) -> UploadResult<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO uploads (
                id, owner_user_id, resource_id, file_name, mime_type, file_size_bytes,
                object_key, title, description, visibility, status, moderation_status,
                created_at, uploaded_at
            ) ",
        );
        builder.push_values(files, |mut row, file| {
            row.push_bind(Uuid::new_v4())
                .push_bind(owner.to_string())
                .push_bind(resource.id)
                .push_bind(file.original_filename.clone())
                .push_bind(file.mime_type.clone())
                .push_bind(file.file_size)
                .push_bind(file.s3_key.clone())
                .push_bind(file.title.clone())
                .push_bind(file.description.clone())
                .push_bind(file.file_visibility.unwrap_or(resource.visibility))
                .push_bind(UploadStatus::Completed)
                .push_bind(ModerationStatus::PendingApproval)
                .push_bind(now)
                .push_bind(None::<DateTime<Utc>>);
        });

        let result = builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    UploadError::Conflict("one of the object keys is already registered".into())
                } else {
                    UploadError::Database(err)
                }
            })?;
        Ok(result.rows_affected())
    }

    /// `uploads`: re-read the rows of `resource_id` in insertion order.
    pub async fn fetch_uploads(&mut self, resource_id: Uuid) -> UploadResult<Vec<UploadRecord>> {
        let rows = sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE resource_id = ? ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(resource_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    pub async fn commit(self) -> UploadResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) {
        if let Err(err) = self.tx.rollback().await {
            tracing::error!(error = %err, "failed to roll back resource transaction");
        }
    }
}

pub(crate) const UPLOAD_COLUMNS: &str = "id, owner_user_id, resource_id, file_name, mime_type, \
     file_size_bytes, object_key, title, description, visibility, status, moderation_status, \
     created_at, uploaded_at";

#[derive(Clone)]
pub struct ResourceCreationService {
    db: Arc<SqlitePool>,
    settings: Arc<UploadSettings>,
}

impl ResourceCreationService {
    pub fn new(db: Arc<SqlitePool>, settings: Arc<UploadSettings>) -> Self {
        Self { db, settings }
    }

    /// Atomically create the resource, resolve or create its folder, link
    /// them and register every uploaded file.
    #[tracing::instrument(skip(self, meta, folder, files), fields(count = files.len()))]
    pub async fn create(
        &self,
        meta: ResourceMeta,
        folder: FolderSelection,
        files: Vec<UploadedFile>,
        principal: &str,
    ) -> UploadResult<CreatedResource> {
        validation::principal(principal)?;
        self.validate(&meta, &files, principal)?;
        let choice = folder.into_choice()?;

        let tx = timeout(self.settings.tx_max_wait, self.db.begin())
            .await
            .map_err(|_| UploadError::TransactionTimeout("wait"))??;
        let mut tx = ResourceTx::new(tx);

        let outcome = timeout(
            self.settings.tx_timeout,
            Self::run(&mut tx, &meta, choice, &files, principal),
        )
        .await;

        match outcome {
            Ok(Ok(created)) => {
                tx.commit().await?;
                tracing::info!(
                    resource_id = %created.resource.id,
                    folder_id = %created.folder_id,
                    uploads = created.uploads.len(),
                    "resource created"
                );
                Ok(created)
            }
            Ok(Err(err)) => {
                tx.rollback().await;
                tracing::warn!(error = %err, "resource creation rolled back");
                Err(err)
            }
            Err(_) => {
                tx.rollback().await;
                tracing::error!(
                    budget_secs = self.settings.tx_timeout.as_secs(),
                    "resource creation exceeded its time budget"
                );
                Err(UploadError::TransactionTimeout("total"))
            }
        }
    }

    async fn run(
        tx: &mut ResourceTx<'_>,
        meta: &ResourceMeta,
        choice: FolderChoice,
        files: &[UploadedFile],
        principal: &str,
    ) -> UploadResult<CreatedResource> {
        let now = Utc::now();
        let resource = tx.insert_resource(meta, now).await?;

        let folder_id = match choice {
            FolderChoice::Existing(folder_id) => {
                let folder = tx
                    .find_folder(folder_id)
                    .await?
                    .ok_or_else(|| UploadError::NotFound(format!("folder {}", folder_id)))?;
                if folder.owner_user_id != principal {
                    return Err(UploadError::Ownership(
                        "folder is owned by another user".into(),
                    ));
                }
                folder.id
            }
            FolderChoice::New(data) => {
                let folder = tx.insert_folder(&data, principal, now).await?;
                tx.insert_folder_tags(folder.id, &data.tag_ids).await?;
                folder.id
            }
        };

        tx.link_folder_resource(folder_id, resource.id).await?;
        tx.insert_uploads(&resource, principal, files, now).await?;
        let uploads = tx.fetch_uploads(resource.id).await?;

        Ok(CreatedResource {
            resource,
            uploads,
            folder_id,
        })
    }

    fn validate(&self, meta: &ResourceMeta, files: &[UploadedFile], principal: &str) -> UploadResult<()> {
        let title = meta.title.trim();
        if title.is_empty() {
            return Err(UploadError::validation("title is required"));
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(UploadError::Validation(format!(
                "title exceeds {} bytes",
                MAX_TITLE_LEN
            )));
        }

        validation::batch_len(files.len(), &self.settings)?;

        let mut keys = HashSet::new();
        for file in files {
            validation::file(
                &file.original_filename,
                &file.mime_type,
                file.file_size,
                &self.settings,
            )?;
            match object_key::owner_of(&file.s3_key) {
                None => {
                    return Err(UploadError::Validation(format!(
                        "invalid object key `{}`",
                        file.s3_key
                    )));
                }
                Some(owner) if owner != principal => {
                    return Err(UploadError::Ownership(format!(
                        "object key `{}` belongs to another user",
                        file.s3_key
                    )));
                }
                Some(_) => {}
            }
            if !keys.insert(file.s3_key.as_str()) {
                return Err(UploadError::Validation(format!(
                    "object key `{}` appears more than once",
                    file.s3_key
                )));
            }
        }
        Ok(())
    }
}
