//! Represents a logical resource: the unit readers browse, backed by one or
//! more uploaded files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Who may see a resource, folder or individual file.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A resource created by the upload pipeline.
///
/// A resource is conceptually owned by whichever folder links to it. It is
/// only visible to readers once one of its uploads is completed and approved.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Unique identifier for this resource.
    pub id: Uuid,

    /// Human-readable title.
    pub title: String,

    /// Optional longer description.
    pub description: Option<String>,

    /// Optional free-form category label.
    pub category: Option<String>,

    /// Whether the resource is listed publicly.
    pub visibility: Visibility,

    /// When this resource was created.
    pub created_at: DateTime<Utc>,
}
