//! Optional phase four: the client confirms storage-side success and the
//! matching upload rows get their `uploaded_at` stamp. Advisory only;
//! moderation and visibility never depend on it.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::error::{UploadError, UploadResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub resource_id: Uuid,
    pub updated: u64,
}

#[derive(Clone)]
pub struct CompletionVerifier {
    db: Arc<SqlitePool>,
}

impl CompletionVerifier {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Stamp the principal's uploads of `resource_id`, restricted to
    /// `object_keys` when that list is non-empty. Repeating the call leaves
    /// the same set of rows stamped.
    #[tracing::instrument(skip(self, object_keys), fields(keys = object_keys.len()))]
    pub async fn complete(
        &self,
        resource_id: Uuid,
        object_keys: &[String],
        principal: &str,
    ) -> UploadResult<CompletionSummary> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM resources WHERE id = ?)")
            .bind(resource_id)
            .fetch_one(&*self.db)
            .await?;
        if !exists {
            return Err(UploadError::NotFound(format!("resource {}", resource_id)));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE uploads SET uploaded_at = ");
        builder.push_bind(Utc::now());
        builder.push(" WHERE resource_id = ");
        builder.push_bind(resource_id);
        builder.push(" AND owner_user_id = ");
        builder.push_bind(principal.to_string());
        if !object_keys.is_empty() {
            builder.push(" AND object_key IN (");
            let mut separated = builder.separated(", ");
            for key in object_keys {
                separated.push_bind(key.clone());
            }
            separated.push_unseparated(")");
        }

        let result = builder.build().execute(&*self.db).await?;
        tracing::info!(%resource_id, updated = result.rows_affected(), "upload completion recorded");

        Ok(CompletionSummary {
            resource_id,
            updated: result.rows_affected(),
        })
    }
}
