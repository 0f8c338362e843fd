//! Shared state handed to every handler.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::{
    completion_service::CompletionVerifier, deletion_service::DeletionCoordinator,
    object_storage::ObjectStorageGateway, presign_service::PresignedUrlIssuer,
    query_service::UploadQueries, rate_limiter::RateLimiter,
    resource_service::ResourceCreationService, retry::RetryPolicy,
};
use crate::config::UploadSettings;

#[derive(Clone)]
pub struct UploadService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,
    pub limiter: RateLimiter,
    pub presign: PresignedUrlIssuer,
    pub resources: ResourceCreationService,
    pub completion: CompletionVerifier,
    pub deletion: DeletionCoordinator,
    pub queries: UploadQueries,
}

impl UploadService {
    pub fn new(
        db: Arc<SqlitePool>,
        gateway: Arc<dyn ObjectStorageGateway>,
        settings: UploadSettings,
    ) -> Self {
        let limiter = RateLimiter::new();
        let retry = RetryPolicy::new(settings.retry_max_attempts, settings.retry_base_delay);
        let max_delete_batch = settings.max_delete_batch;
        let settings = Arc::new(settings);

        Self {
            presign: PresignedUrlIssuer::new(
                db.clone(),
                gateway.clone(),
                limiter.clone(),
                retry.clone(),
                settings.clone(),
            ),
            resources: ResourceCreationService::new(db.clone(), settings.clone()),
            completion: CompletionVerifier::new(db.clone()),
            deletion: DeletionCoordinator::new(db.clone(), gateway.clone(), retry.clone(), max_delete_batch),
            queries: UploadQueries::new(db.clone(), gateway, retry, settings),
            limiter,
            db,
        }
    }
}
