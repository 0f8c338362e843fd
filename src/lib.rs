//! Direct-to-storage upload orchestration.
//!
//! Clients ask for presigned PUT URLs, upload bytes straight to the object
//! store, then record the resulting resource and its uploads in one
//! transaction. This crate never touches file bytes.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;

use crate::services::UploadService;

/// The full HTTP application with state attached.
pub fn app(service: UploadService) -> Router {
    routes::routes::routes().with_state(service)
}
