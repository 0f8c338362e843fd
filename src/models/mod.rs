//! Core data models for the upload orchestration service.
//!
//! Persisted entities map to SQLite tables via `sqlx::FromRow` and serialize
//! as camelCase JSON via `serde`. Ephemeral request/response shapes for the
//! presign phase live in `upload`.

pub mod folder;
pub mod resource;
pub mod upload;

pub use folder::Folder;
pub use resource::{Resource, Visibility};
pub use upload::{ModerationStatus, UploadRecord, UploadStatus};
