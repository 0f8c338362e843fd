//! HTTP handlers for the upload pipeline. File bytes never pass through
//! here; handlers only translate JSON to service calls.

use crate::{
    errors::AppError,
    handlers::{
        extract::{ApiJson, ApiPath, ApiQuery},
        principal::Principal,
    },
    models::{
        Resource, UploadRecord,
        upload::{FileDescriptor, PresignedUrlResult},
    },
    services::{
        UploadService,
        completion_service::CompletionSummary,
        deletion_service::DeletionSummary,
        query_service::{DownloadUrl, Page, PageParams},
        resource_service::{CreatedResource, FolderSelection, ResourceMeta, UploadedFile},
    },
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

/// Body of `POST /uploads/create-resource`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceReq {
    #[serde(flatten)]
    pub resource: ResourceMeta,
    #[serde(default)]
    pub folder_selection: FolderSelection,
    pub files: Vec<UploadedFile>,
}

/// Body of `POST /uploads/complete/{resourceId}`; the body itself is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteReq {
    #[serde(default)]
    pub s3_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileReq {
    pub s3_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFilesReq {
    pub s3_keys: Vec<String>,
}

/// `POST /uploads/request-presigned-urls`
pub async fn request_presigned_urls(
    State(service): State<UploadService>,
    Principal(principal): Principal,
    ApiJson(files): ApiJson<Vec<FileDescriptor>>,
) -> Result<Json<PresignedUrlResult>, AppError> {
    let result = service.presign.request_urls(&files, &principal).await?;
    Ok(Json(result))
}

/// `POST /uploads/create-resource`
pub async fn create_resource(
    State(service): State<UploadService>,
    Principal(principal): Principal,
    ApiJson(req): ApiJson<CreateResourceReq>,
) -> Result<impl IntoResponse, AppError> {
    let created: CreatedResource = service
        .resources
        .create(req.resource, req.folder_selection, req.files, &principal)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /uploads/complete/{resourceId}`
pub async fn complete_upload(
    State(service): State<UploadService>,
    Principal(principal): Principal,
    ApiPath(resource_id): ApiPath<Uuid>,
    body: Option<ApiJson<CompleteReq>>,
) -> Result<Json<CompletionSummary>, AppError> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let summary = service
        .completion
        .complete(resource_id, &req.s3_keys, &principal)
        .await?;
    Ok(Json(summary))
}

/// `GET /uploads/my-uploads?page=&limit=`
pub async fn my_uploads(
    State(service): State<UploadService>,
    Principal(principal): Principal,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<UploadRecord>>, AppError> {
    Ok(Json(service.queries.my_uploads(&principal, params).await?))
}

/// `GET /uploads/resources?page=&limit=`
pub async fn list_resources(
    State(service): State<UploadService>,
    Principal(_principal): Principal,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Resource>>, AppError> {
    Ok(Json(service.queries.public_resources(params).await?))
}

/// `DELETE /uploads/delete-s3-file`
pub async fn delete_file(
    State(service): State<UploadService>,
    Principal(principal): Principal,
    ApiJson(req): ApiJson<DeleteFileReq>,
) -> Result<StatusCode, AppError> {
    service.deletion.delete_object(&req.s3_key, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /uploads/delete-multiple-s3-files`
pub async fn delete_files(
    State(service): State<UploadService>,
    Principal(principal): Principal,
    ApiJson(req): ApiJson<DeleteFilesReq>,
) -> Result<Json<DeletionSummary>, AppError> {
    let summary = service
        .deletion
        .delete_objects(&req.s3_keys, &principal)
        .await?;
    Ok(Json(summary))
}

/// `GET /uploads/download/{uploadId}`
pub async fn download(
    State(service): State<UploadService>,
    Principal(principal): Principal,
    ApiPath(upload_id): ApiPath<Uuid>,
) -> Result<Json<DownloadUrl>, AppError> {
    Ok(Json(service.queries.download_url(upload_id, &principal).await?))
}
