//! Represents a folder: an owned container that groups resources.

use super::resource::Visibility;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A folder owned by a single principal.
///
/// Folders are either selected by id (and must then belong to the acting
/// principal) or created inside the same transaction as the resource.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Unique identifier for this folder.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Whether the folder is listed publicly.
    pub visibility: Visibility,

    /// Principal that owns the folder.
    pub owner_user_id: String,

    /// Optional classification level (e.g. course or grade).
    pub classification_level_id: Option<Uuid>,

    /// When this folder was created.
    pub created_at: DateTime<Utc>,
}
