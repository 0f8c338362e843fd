//! Ownership-scoped deletion across the object store and the database.
//!
//! Authorization is structural: the owner id embedded in the key must match
//! the caller. No database lookup happens before the storage call, and a
//! foreign key never reaches storage.

use std::sync::Arc;

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{
    error::{UploadError, UploadResult},
    object_key,
    object_storage::ObjectStorageGateway,
    retry::RetryPolicy,
};

/// Outcome of a delete: objects removed from storage and upload rows
/// removed from the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSummary {
    pub deleted: usize,
    pub records: u64,
}

#[derive(Clone)]
pub struct DeletionCoordinator {
    db: Arc<SqlitePool>,
    gateway: Arc<dyn ObjectStorageGateway>,
    retry: RetryPolicy,
    max_batch: usize,
}

impl DeletionCoordinator {
    pub fn new(
        db: Arc<SqlitePool>,
        gateway: Arc<dyn ObjectStorageGateway>,
        retry: RetryPolicy,
        max_batch: usize,
    ) -> Self {
        Self {
            db,
            gateway,
            retry,
            max_batch,
        }
    }

    fn authorize(key: &str, principal: &str) -> UploadResult<()> {
        match object_key::owner_of(key) {
            None => Err(UploadError::Validation(format!("invalid object key `{}`", key))),
            Some(owner) if owner != principal => {
                tracing::warn!(principal, object_key = key, "delete refused: owner mismatch");
                Err(UploadError::Unauthorized(key.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Delete one object and its upload row.
    #[tracing::instrument(skip(self))]
    pub async fn delete_object(&self, key: &str, principal: &str) -> UploadResult<DeletionSummary> {
        Self::authorize(key, principal)?;

        self.retry
            .execute("delete_object", || self.gateway.delete(key))
            .await?;

        let result = sqlx::query("DELETE FROM uploads WHERE object_key = ? AND owner_user_id = ?")
            .bind(key)
            .bind(principal)
            .execute(&*self.db)
            .await?;

        tracing::info!(rows = result.rows_affected(), "object deleted");
        Ok(DeletionSummary {
            deleted: 1,
            records: result.rows_affected(),
        })
    }

    /// Delete a batch. Every key is authorized before any storage call, so
    /// one foreign key fails the whole batch without side effects.
    #[tracing::instrument(skip(self, keys), fields(count = keys.len()))]
    pub async fn delete_objects(
        &self,
        keys: &[String],
        principal: &str,
    ) -> UploadResult<DeletionSummary> {
        if keys.is_empty() {
            return Err(UploadError::validation("at least one object key is required"));
        }
        if keys.len() > self.max_batch {
            return Err(UploadError::Validation(format!(
                "at most {} objects may be deleted at once",
                self.max_batch
            )));
        }
        for key in keys {
            Self::authorize(key, principal)?;
        }

        let mut unique = keys.to_vec();
        unique.sort();
        unique.dedup();

        self.retry
            .execute("delete_objects", || self.gateway.delete_many(&unique))
            .await?;

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM uploads WHERE owner_user_id = ");
        builder.push_bind(principal.to_string());
        builder.push(" AND object_key IN (");
        let mut separated = builder.separated(", ");
        for key in &unique {
            separated.push_bind(key.clone());
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&*self.db).await?;
        tracing::info!(rows = result.rows_affected(), "objects deleted");
        Ok(DeletionSummary {
            deleted: unique.len(),
            records: result.rows_affected(),
        })
    }
}
