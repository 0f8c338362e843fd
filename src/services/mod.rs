//! Upload pipeline services. Each phase of a session lives in its own module;
//! `UploadService` bundles them as the router's shared state.

pub mod completion_service;
pub mod deletion_service;
pub mod error;
pub mod object_key;
pub mod object_storage;
pub mod presign_service;
pub mod query_service;
pub mod rate_limiter;
pub mod resource_service;
pub mod retry;
pub mod upload_service;
pub mod validation;

pub use error::{UploadError, UploadResult};
pub use upload_service::UploadService;
