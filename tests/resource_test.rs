mod common;

use common::{TestApp, count, descriptor, seed_tag, seed_user, uploaded};
use std::time::Duration;
use upload_orchestrator::{
    config::UploadSettings,
    models::{ModerationStatus, UploadStatus, Visibility},
    services::{
        UploadError,
        resource_service::{FolderSelection, NewFolderData, ResourceMeta, UploadedFile},
    },
};
use uuid::Uuid;

fn meta(title: &str) -> ResourceMeta {
    ResourceMeta {
        title: title.to_string(),
        description: Some("lecture notes".into()),
        category: None,
        visibility: Visibility::Public,
    }
}

fn new_folder(name: &str, tag_ids: Vec<Uuid>) -> FolderSelection {
    FolderSelection {
        folder_id: None,
        new_folder_data: Some(NewFolderData {
            name: name.to_string(),
            description: None,
            visibility: Visibility::Private,
            classification_level_id: None,
            tag_ids,
        }),
    }
}

async fn presigned_files(app: &TestApp, user: &str, n: usize) -> Vec<UploadedFile> {
    let descriptors: Vec<_> = (0..n)
        .map(|i| descriptor(&format!("file{i}.pdf"), "application/pdf", 100 + i as i64))
        .collect();
    app.presign(user, &descriptors).await.iter().map(uploaded).collect()
}

async fn assert_nothing_written(app: &TestApp) {
    for table in ["resources", "folders", "folder_tags", "folder_resources", "uploads"] {
        assert_eq!(count(&app.db, table).await, 0, "{table} should be empty");
    }
}

#[tokio::test]
async fn creates_resource_folder_link_and_uploads() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    let tag = seed_tag(&app.db, "physics").await;
    let files = presigned_files(&app, "u1", 2).await;

    let created = app
        .service
        .resources
        .create(meta("Week 1"), new_folder("Term 1", vec![tag, tag]), files.clone(), "u1")
        .await
        .unwrap();

    assert_eq!(created.resource.title, "Week 1");
    assert_eq!(created.uploads.len(), 2);
    for (row, file) in created.uploads.iter().zip(&files) {
        assert_eq!(row.object_key, file.s3_key);
        assert_eq!(row.owner_user_id, "u1");
        assert_eq!(row.resource_id, created.resource.id);
        assert_eq!(row.status, UploadStatus::Completed);
        assert_eq!(row.moderation_status, ModerationStatus::PendingApproval);
        assert_eq!(row.visibility, Visibility::Public);
        assert!(row.uploaded_at.is_none());
    }

    assert_eq!(count(&app.db, "resources").await, 1);
    assert_eq!(count(&app.db, "folders").await, 1);
    assert_eq!(count(&app.db, "folder_tags").await, 1);
    assert_eq!(count(&app.db, "folder_resources").await, 1);

    let owner: String = sqlx::query_scalar("SELECT owner_user_id FROM folders WHERE id = ?")
        .bind(created.folder_id)
        .fetch_one(&*app.db)
        .await
        .unwrap();
    assert_eq!(owner, "u1");
}

#[tokio::test]
async fn file_visibility_overrides_resource_visibility() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    let mut files = presigned_files(&app, "u1", 1).await;
    files[0].file_visibility = Some(Visibility::Private);
    files[0].title = Some("Slides".into());

    let created = app
        .service
        .resources
        .create(meta("Week 2"), new_folder("Term 1", vec![]), files, "u1")
        .await
        .unwrap();

    assert_eq!(created.uploads[0].visibility, Visibility::Private);
    assert_eq!(created.uploads[0].title.as_deref(), Some("Slides"));
}

#[tokio::test]
async fn reuses_an_owned_folder() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;

    let first = app
        .service
        .resources
        .create(meta("One"), new_folder("Shared", vec![]), presigned_files(&app, "u1", 1).await, "u1")
        .await
        .unwrap();

    let second = app
        .service
        .resources
        .create(
            meta("Two"),
            FolderSelection {
                folder_id: Some(first.folder_id),
                new_folder_data: None,
            },
            presigned_files(&app, "u1", 1).await,
            "u1",
        )
        .await
        .unwrap();

    assert_eq!(second.folder_id, first.folder_id);
    assert_eq!(count(&app.db, "folders").await, 1);
    assert_eq!(count(&app.db, "folder_resources").await, 2);
}

#[tokio::test]
async fn unknown_tag_rolls_back_everything() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    let files = presigned_files(&app, "u1", 2).await;

    let err = app
        .service
        .resources
        .create(meta("Week 1"), new_folder("Term 1", vec![Uuid::new_v4()]), files, "u1")
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Database(_)), "{err:?}");
    assert_nothing_written(&app).await;
}

#[tokio::test]
async fn foreign_folder_is_refused_and_rolled_back() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    seed_user(&app.db, "u2").await;

    let theirs = app
        .service
        .resources
        .create(meta("Theirs"), new_folder("Private", vec![]), presigned_files(&app, "u2", 1).await, "u2")
        .await
        .unwrap();

    let err = app
        .service
        .resources
        .create(
            meta("Mine"),
            FolderSelection {
                folder_id: Some(theirs.folder_id),
                new_folder_data: None,
            },
            presigned_files(&app, "u1", 1).await,
            "u1",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Ownership(_)));
    assert_eq!(count(&app.db, "resources").await, 1);
    assert_eq!(count(&app.db, "uploads").await, 1);
}

#[tokio::test]
async fn missing_folder_is_not_found() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;

    let err = app
        .service
        .resources
        .create(
            meta("Orphan"),
            FolderSelection {
                folder_id: Some(Uuid::new_v4()),
                new_folder_data: None,
            },
            presigned_files(&app, "u1", 1).await,
            "u1",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::NotFound(_)));
    assert_nothing_written(&app).await;
}

#[tokio::test]
async fn keys_minted_for_someone_else_are_refused() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    seed_user(&app.db, "u2").await;
    let stolen = presigned_files(&app, "u2", 1).await;

    let err = app
        .service
        .resources
        .create(meta("Stolen"), new_folder("F", vec![]), stolen, "u1")
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Ownership(_)));
    assert_nothing_written(&app).await;
}

#[tokio::test]
async fn registering_a_key_twice_conflicts() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    let files = presigned_files(&app, "u1", 1).await;

    app.service
        .resources
        .create(meta("First"), new_folder("F", vec![]), files.clone(), "u1")
        .await
        .unwrap();
    let err = app
        .service
        .resources
        .create(meta("Again"), new_folder("G", vec![]), files, "u1")
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Conflict(_)));
    assert_eq!(count(&app.db, "resources").await, 1);
    assert_eq!(count(&app.db, "folders").await, 1);
}

#[tokio::test]
async fn invalid_requests_write_nothing() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    let files = presigned_files(&app, "u1", 1).await;

    let cases = [
        (meta("  "), new_folder("F", vec![]), files.clone()),
        (meta("No files"), new_folder("F", vec![]), vec![]),
        (meta("No folder"), FolderSelection::default(), files.clone()),
        (
            meta("Both"),
            FolderSelection {
                folder_id: Some(Uuid::new_v4()),
                ..new_folder("F", vec![])
            },
            files.clone(),
        ),
        (meta("Dupes"), new_folder("F", vec![]), vec![files[0].clone(), files[0].clone()]),
    ];

    for (meta, folder, files) in cases {
        let err = app
            .service
            .resources
            .create(meta, folder, files, "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)), "{err:?}");
    }
    assert_nothing_written(&app).await;
}

#[tokio::test]
async fn waiting_for_a_connection_is_bounded() {
    let app = TestApp::with_settings(UploadSettings {
        tx_max_wait: Duration::from_millis(50),
        ..common::fast_settings()
    })
    .await;
    seed_user(&app.db, "u1").await;
    let files = presigned_files(&app, "u1", 1).await;

    // The pool has a single connection; hold it.
    let held = app.db.acquire().await.unwrap();
    let err = app
        .service
        .resources
        .create(meta("Blocked"), new_folder("F", vec![]), files, "u1")
        .await
        .unwrap_err();
    drop(held);

    assert!(matches!(err, UploadError::TransactionTimeout("wait")));
    assert_nothing_written(&app).await;
}

#[tokio::test]
async fn exceeding_the_total_budget_rolls_back() {
    let (url, pool) = common::file_pool(Duration::from_secs(1)).await;
    let app = TestApp::with_pool(
        pool,
        UploadSettings {
            tx_timeout: Duration::from_millis(100),
            ..common::fast_settings()
        },
    );
    seed_user(&app.db, "u1").await;
    let files = presigned_files(&app, "u1", 1).await;

    // Another writer holds the write lock, so the first insert stalls in
    // SQLite's busy handler past the transaction budget.
    let other = upload_orchestrator::db::connect(&url, Duration::from_secs(1))
        .await
        .unwrap();
    let mut writer = other.acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *writer).await.unwrap();

    let err = app
        .service
        .resources
        .create(meta("Slow"), new_folder("F", vec![]), files, "u1")
        .await
        .unwrap_err();

    sqlx::query("ROLLBACK").execute(&mut *writer).await.unwrap();
    drop(writer);
    other.close().await;

    assert!(matches!(err, UploadError::TransactionTimeout("total")), "{err:?}");
    assert_nothing_written(&app).await;

    app.db.close().await;
    let path = url.trim_start_matches("sqlite://");
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}

#[tokio::test]
async fn completion_stamps_uploads_idempotently() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    let files = presigned_files(&app, "u1", 2).await;
    let created = app
        .service
        .resources
        .create(meta("Done"), new_folder("F", vec![]), files.clone(), "u1")
        .await
        .unwrap();

    let only_first = app
        .service
        .completion
        .complete(created.resource.id, &[files[0].s3_key.clone()], "u1")
        .await
        .unwrap();
    assert_eq!(only_first.updated, 1);

    let all = app
        .service
        .completion
        .complete(created.resource.id, &[], "u1")
        .await
        .unwrap();
    assert_eq!(all.updated, 2);

    let again = app
        .service
        .completion
        .complete(created.resource.id, &[], "u1")
        .await
        .unwrap();
    assert_eq!(again.updated, 2);

    let stamped: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM uploads WHERE uploaded_at IS NOT NULL")
        .fetch_one(&*app.db)
        .await
        .unwrap();
    assert_eq!(stamped, 2);
}

#[tokio::test]
async fn completion_is_scoped_to_the_caller() {
    let app = TestApp::new().await;
    seed_user(&app.db, "u1").await;
    seed_user(&app.db, "u2").await;
    let created = app
        .service
        .resources
        .create(meta("Mine"), new_folder("F", vec![]), presigned_files(&app, "u1", 1).await, "u1")
        .await
        .unwrap();

    let summary = app
        .service
        .completion
        .complete(created.resource.id, &[], "u2")
        .await
        .unwrap();
    assert_eq!(summary.updated, 0);

    let err = app
        .service
        .completion
        .complete(Uuid::new_v4(), &[], "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::NotFound(_)));
}
