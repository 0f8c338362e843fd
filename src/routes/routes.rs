//! Routes for the upload pipeline.
//!
//! ## Structure
//! - **Probes** (mounted at root)
//!   - `GET    /healthz`
//!   - `GET    /readyz`
//!
//! - **Upload endpoints** (all require `X-User-ID`)
//!   - `POST   /uploads/request-presigned-urls`: issue PUT URLs for a batch
//!   - `POST   /uploads/create-resource`: record resource, folder and uploads atomically
//!   - `POST   /uploads/complete/{resource_id}`: stamp uploads as delivered
//!   - `GET    /uploads/my-uploads`: caller's uploads, paginated
//!   - `GET    /uploads/resources`: public, approved resources
//!   - `DELETE /uploads/delete-s3-file`: delete one owned object
//!   - `DELETE /uploads/delete-multiple-s3-files`: delete a batch of owned objects
//!   - `GET    /uploads/download/{upload_id}`: time-bound download URL

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{
            complete_upload, create_resource, delete_file, delete_files, download, list_resources,
            my_uploads, request_presigned_urls,
        },
    },
    services::UploadService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build the router. State (`UploadService`) is attached by the caller.
pub fn routes() -> Router<UploadService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/uploads", upload_routes())
}

fn upload_routes() -> Router<UploadService> {
    Router::new()
        .route("/request-presigned-urls", post(request_presigned_urls))
        .route("/create-resource", post(create_resource))
        .route("/complete/{resource_id}", post(complete_upload))
        .route("/my-uploads", get(my_uploads))
        .route("/resources", get(list_resources))
        .route("/delete-s3-file", delete(delete_file))
        .route("/delete-multiple-s3-files", delete(delete_files))
        .route("/download/{upload_id}", get(download))
}
