//! Shared fixtures: an in-memory SQLite pool with the schema applied and a
//! scriptable object-store gateway that records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    str::FromStr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use upload_orchestrator::{
    config::UploadSettings,
    db,
    models::upload::{FileDescriptor, PresignedEntry},
    services::{
        UploadService,
        object_storage::{GatewayError, GatewayResult, ObjectStorageGateway},
        resource_service::UploadedFile,
    },
};
use uuid::Uuid;

/// Gateway double. URLs are deterministic; failures are injected per call.
#[derive(Default)]
pub struct MockGateway {
    presign_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    transient_failures: AtomicUsize,
    reject_keys: Mutex<bool>,
    deleted: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` calls with a retryable error.
    pub fn fail_next(&self, n: usize) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Reject every key as invalid (a permanent error).
    pub fn reject_all_keys(&self) {
        *self.reject_keys.lock().unwrap() = true;
    }

    pub fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn gate(&self, key: &str) -> GatewayResult<()> {
        if *self.reject_keys.lock().unwrap() {
            return Err(GatewayError::InvalidKey(key.to_string()));
        }
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(GatewayError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorageGateway for MockGateway {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> GatewayResult<String> {
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(key)?;
        Ok(format!(
            "https://mock-bucket.local/{}?method=PUT&content-type={}&expires={}",
            key,
            content_type,
            expires_in.as_secs()
        ))
    }

    async fn presign_download(&self, key: &str, expires_in: Duration) -> GatewayResult<String> {
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(key)?;
        Ok(format!(
            "https://mock-bucket.local/{}?method=GET&expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(key)?;
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> GatewayResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            self.gate(key)?;
        }
        self.deleted.lock().unwrap().extend(keys.iter().cloned());
        Ok(())
    }
}

/// Production limits with near-zero retry backoff.
pub fn fast_settings() -> UploadSettings {
    UploadSettings {
        retry_base_delay: Duration::from_millis(1),
        ..UploadSettings::default()
    }
}

/// Single-connection in-memory database; the connection must outlive the test.
pub async fn test_pool() -> Arc<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

/// File-backed database under the temp dir, for tests that need a second
/// connection contending for SQLite's write lock. Returns the url and pool.
pub async fn file_pool(busy_timeout: Duration) -> (String, Arc<SqlitePool>) {
    let path = std::env::temp_dir().join(format!("uploads-test-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    let pool = db::connect(&url, busy_timeout).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    (url, Arc::new(pool))
}

pub async fn seed_user(db: &SqlitePool, id: &str) {
    sqlx::query("INSERT INTO users (id, display_name) VALUES (?, ?)")
        .bind(id)
        .bind(format!("User {}", id))
        .execute(db)
        .await
        .unwrap();
}

pub async fn seed_tag(db: &SqlitePool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO tags (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(db)
        .await
        .unwrap();
    id
}

pub async fn count(db: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(db)
        .await
        .unwrap()
}

pub fn descriptor(name: &str, mime: &str, size: i64) -> FileDescriptor {
    FileDescriptor {
        original_filename: name.to_string(),
        mime_type: mime.to_string(),
        file_size: size,
    }
}

/// The create-resource entry a client sends after PUTting `entry`.
pub fn uploaded(entry: &PresignedEntry) -> UploadedFile {
    UploadedFile {
        original_filename: entry.original_filename.clone(),
        mime_type: entry.mime_type.clone(),
        file_size: entry.file_size,
        s3_key: entry.s3_key.clone(),
        title: None,
        description: None,
        file_visibility: None,
    }
}

pub struct TestApp {
    pub db: Arc<SqlitePool>,
    pub gateway: Arc<MockGateway>,
    pub service: UploadService,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(fast_settings()).await
    }

    pub async fn with_settings(settings: UploadSettings) -> Self {
        Self::with_pool(test_pool().await, settings)
    }

    pub fn with_pool(db: Arc<SqlitePool>, settings: UploadSettings) -> Self {
        let gateway = MockGateway::new();
        let service = UploadService::new(db.clone(), gateway.clone(), settings);
        Self {
            db,
            gateway,
            service,
        }
    }

    /// Presign `files` for `user` and return the entries.
    pub async fn presign(&self, user: &str, files: &[FileDescriptor]) -> Vec<PresignedEntry> {
        self.service
            .presign
            .request_urls(files, user)
            .await
            .unwrap()
            .pre_signed_data
    }
}
