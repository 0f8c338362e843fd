//! Object storage capability used by the upload pipeline.
//!
//! The application never touches file bytes: it only asks the storage
//! service for time-bound URLs and for deletions. `S3Gateway` implements the
//! capability on top of `object_store`'s S3 client and request signer.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use http::Method;
use object_store::{
    ObjectStoreExt,
    aws::{AmazonS3, AmazonS3Builder},
    path::Path,
    signer::Signer,
};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::retry::Retryable;

/// Deletes issued concurrently by `delete_many`.
const DELETE_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage configuration error: {0}")]
    Config(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl Retryable for GatewayError {
    fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

#[async_trait]
pub trait ObjectStorageGateway: Send + Sync {
    /// Presigned PUT URL the client uploads `key` to.
    ///
    /// `content_type` is the type the client declared. Backends that can sign
    /// request headers bind it into the signature; query-signed URLs (the S3
    /// gateway) cannot, so the stored object's type is whatever the client
    /// sends with the PUT.
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> GatewayResult<String>;

    /// Presigned GET URL for downloading `key`.
    async fn presign_download(&self, key: &str, expires_in: Duration) -> GatewayResult<String>;

    /// Delete a single object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> GatewayResult<()>;

    /// Delete several objects; fails if any deletion fails.
    async fn delete_many(&self, keys: &[String]) -> GatewayResult<()>;
}

/// S3 (or S3-compatible) gateway.
#[derive(Clone)]
pub struct S3Gateway {
    store: AmazonS3,
    bucket: String,
}

impl S3Gateway {
    /// Build a gateway from the environment (`AWS_*` credentials) plus the
    /// explicit bucket, region and optional endpoint (MinIO, R2, ...).
    pub fn new(bucket: String, region: String, endpoint: Option<String>) -> GatewayResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self { store, bucket })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn sign(&self, method: Method, key: &str, expires_in: Duration) -> GatewayResult<String> {
        let location = Path::parse(key).map_err(|_| GatewayError::InvalidKey(key.to_string()))?;
        let url = self
            .store
            .signed_url(method, &location, expires_in)
            .await
            .map_err(map_store_error)?;
        Ok(url.to_string())
    }
}

fn map_store_error(err: object_store::Error) -> GatewayError {
    match err {
        object_store::Error::InvalidPath { source } => GatewayError::InvalidKey(source.to_string()),
        object_store::Error::NotSupported { source } => GatewayError::Config(source.to_string()),
        other => GatewayError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ObjectStorageGateway for S3Gateway {
    #[tracing::instrument(skip(self), fields(s3.bucket = %self.bucket))]
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> GatewayResult<String> {
        // `Signer::signed_url` only covers the method, path and expiry.
        let url = self.sign(Method::PUT, key, expires_in).await?;
        tracing::debug!(
            expires_in_secs = expires_in.as_secs(),
            content_type,
            "issued presigned PUT URL (content type not signed)"
        );
        Ok(url)
    }

    #[tracing::instrument(skip(self), fields(s3.bucket = %self.bucket))]
    async fn presign_download(&self, key: &str, expires_in: Duration) -> GatewayResult<String> {
        self.sign(Method::GET, key, expires_in).await
    }

    #[tracing::instrument(skip(self), fields(s3.bucket = %self.bucket))]
    async fn delete(&self, key: &str) -> GatewayResult<()> {
        let start = Instant::now();
        let location = Path::parse(key).map_err(|_| GatewayError::InvalidKey(key.to_string()))?;

        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                tracing::info!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    "S3 delete successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "S3 delete failed");
                Err(map_store_error(e))
            }
        }
    }

    #[tracing::instrument(skip(self, keys), fields(s3.bucket = %self.bucket, count = keys.len()))]
    async fn delete_many(&self, keys: &[String]) -> GatewayResult<()> {
        let results: Vec<GatewayResult<()>> = stream::iter(keys.iter().cloned())
            .map(|key| async move { self.delete(&key).await })
            .buffer_unordered(DELETE_CONCURRENCY)
            .collect()
            .await;

        results.into_iter().collect()
    }
}
