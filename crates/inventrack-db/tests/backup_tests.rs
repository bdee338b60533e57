//! Snapshot export, restore and JSON export.

use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use inventrack_core::{Asset, AssetFilter, Movement, MovementFilter, NewAsset, User};
use inventrack_db::backup::MAX_UPLOAD_BYTES;
use inventrack_db::{
    Actor, BackupError, BackupManager, Database, DbConfig, DbError, LedgerService, RestartSignal,
};

async fn open(path: &std::path::Path) -> Database {
    Database::connect(
        DbConfig::embedded(path)
            .flush_interval(None)
            .admin_password("test-admin-pw"),
    )
    .await
    .unwrap()
}

fn asset(sku: &str, quantity: i64) -> NewAsset {
    NewAsset {
        name: format!("Asset {sku}"),
        category: "Elektronik".to_string(),
        sku: Some(sku.to_string()),
        quantity,
        location: "Gudang A".to_string(),
        ..Default::default()
    }
}

/// Every asset, movement and user, ordered by id.
async fn contents(db: &Database) -> (Vec<Asset>, Vec<Movement>, Vec<User>) {
    let mut assets = db.assets().list(&AssetFilter::default()).await.unwrap();
    let mut movements = db.movements().list(&MovementFilter::default()).await.unwrap();
    let mut users = db.users().list().await.unwrap();
    assets.sort_by(|a, b| a.id.cmp(&b.id));
    movements.sort_by(|a, b| a.id.cmp(&b.id));
    users.sort_by(|a, b| a.id.cmp(&b.id));
    (assets, movements, users)
}

fn manager(db: &Database) -> BackupManager {
    BackupManager::new(db.clone(), RestartSignal::new()).restart_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn test_export_then_restore_into_another_store() {
    let source_dir = tempfile::tempdir().unwrap();
    let source = open(&source_dir.path().join("inventrack.db")).await;
    let created = source.assets().create(asset("ELE-000001", 10)).await.unwrap();
    source.assets().create(asset("FUR-000002", 2)).await.unwrap();
    let ledger = LedgerService::new(source.clone());
    ledger
        .record_movement(&created.id, "check-out", 3, &Actor::new("u1", "Tester"), None)
        .await
        .unwrap();
    ledger
        .record_movement(&created.id, "check-in", 1, &Actor::new("u1", "Tester"), Some("Retur".to_string()))
        .await
        .unwrap();

    let before = contents(&source).await;
    assert_eq!(before.0.len(), 2);
    assert_eq!(before.1.len(), 2);

    let export = manager(&source).export_snapshot().await.unwrap();
    assert!(export.filename.starts_with("inventrack_backup_"));
    assert!(export.filename.ends_with(".db"));
    assert!(export.bytes.starts_with(b"SQLite format 3\0"));

    let target_dir = tempfile::tempdir().unwrap();
    let target_path = target_dir.path().join("inventrack.db");
    let target = open(&target_path).await;
    target.assets().create(asset("OLD-000001", 1)).await.unwrap();

    let restart = RestartSignal::new();
    let mut restarts = restart.subscribe();
    let outcome = BackupManager::new(target.clone(), restart)
        .restart_delay(Duration::from_millis(10))
        .import_snapshot(&export.bytes, Some("application/octet-stream"))
        .await
        .unwrap();

    assert!(outcome.restart_required);
    assert_eq!(outcome.bytes, export.bytes.len());
    let safety = outcome.safety_copy.expect("previous snapshot copied");
    assert!(safety.exists());
    assert!(target.is_sealed());

    let err = target.assets().create(asset("NEW-000001", 1)).await.unwrap_err();
    assert!(matches!(err, inventrack_db::ServiceError::Db(DbError::RestartPending)));

    tokio::time::timeout(Duration::from_secs(2), restarts.changed())
        .await
        .unwrap()
        .unwrap();

    // The sealed store must not flush its old contents over the restore.
    target.shutdown().await.unwrap();

    let restored = open(&target_path).await;
    let reloaded = restored.assets().get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(reloaded.quantity, 8);
    assert!(restored.assets().get_by_sku("OLD-000001").await.unwrap().is_none());

    assert_eq!(contents(&restored).await, before);
}

#[tokio::test]
async fn test_restore_from_multipart_upload() {
    let source_dir = tempfile::tempdir().unwrap();
    let source = open(&source_dir.path().join("inventrack.db")).await;
    source.assets().create(asset("ELE-000001", 4)).await.unwrap();
    let export = manager(&source).export_snapshot().await.unwrap();

    let mut body = Vec::new();
    body.extend_from_slice(b"--form42\r\nContent-Disposition: form-data; name=\"database\"; filename=\"backup.db\"\r\n");
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(&export.bytes);
    body.extend_from_slice(b"\r\n--form42--\r\n");

    let target_dir = tempfile::tempdir().unwrap();
    let target_path = target_dir.path().join("inventrack.db");
    let target = open(&target_path).await;

    let outcome = manager(&target)
        .import_snapshot(&body, Some("multipart/form-data; boundary=form42"))
        .await
        .unwrap();
    assert_eq!(outcome.bytes, export.bytes.len());
    target.shutdown().await.unwrap();

    let restored = open(&target_path).await;
    assert!(restored.assets().get_by_sku("ELE-000001").await.unwrap().is_some());
}

#[tokio::test]
async fn test_invalid_upload_leaves_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventrack.db");
    let db = open(&path).await;
    db.assets().create(asset("ELE-000001", 4)).await.unwrap();

    let before = tokio::fs::read(&path).await.unwrap();

    let err = manager(&db)
        .import_snapshot(b"PK\x03\x04 definitely a zip file", None)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::InvalidFormat(_)));

    let after = tokio::fs::read(&path).await.unwrap();
    assert_eq!(before, after);
    assert!(!db.is_sealed());

    // No safety copy is written for a rejected upload.
    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().into_owned();
        assert!(!name.contains("_pre_restore_"), "unexpected {name}");
    }
}

#[tokio::test]
async fn test_foreign_sqlite_file_is_rejected_and_store_still_opens() {
    let dir = tempfile::tempdir().unwrap();
    let foreign = dir.path().join("notes.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&foreign)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("INSERT INTO notes (body) VALUES ('halo')")
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
    let upload = tokio::fs::read(&foreign).await.unwrap();
    assert!(upload.starts_with(b"SQLite format 3\0"));

    let path = dir.path().join("inventrack.db");
    let db = open(&path).await;
    db.assets().create(asset("ELE-000001", 4)).await.unwrap();
    let before = tokio::fs::read(&path).await.unwrap();

    let err = manager(&db).import_snapshot(&upload, None).await.unwrap_err();
    assert!(matches!(err, BackupError::InvalidFormat(_)));
    assert!(!db.is_sealed());
    assert_eq!(tokio::fs::read(&path).await.unwrap(), before);
    assert!(!dir.path().join("inventrack.db.tmp").exists());

    // Writes keep working, and the next start loads the untouched snapshot.
    db.assets().create(asset("ELE-000002", 1)).await.unwrap();
    db.shutdown().await.unwrap();

    let reopened = open(&path).await;
    assert!(reopened.assets().get_by_sku("ELE-000001").await.unwrap().is_some());
    assert!(reopened.assets().get_by_sku("ELE-000002").await.unwrap().is_some());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir.path().join("inventrack.db")).await;

    let mut upload = b"SQLite format 3\0".to_vec();
    upload.resize(MAX_UPLOAD_BYTES + 1, 0);

    let err = manager(&db).import_snapshot(&upload, None).await.unwrap_err();
    assert!(matches!(err, BackupError::PayloadTooLarge { limit } if limit == MAX_UPLOAD_BYTES));
    assert!(!db.is_sealed());
}

#[tokio::test]
async fn test_json_export_omits_password_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir.path().join("inventrack.db")).await;
    let created = db.assets().create(asset("ELE-000001", 5)).await.unwrap();
    LedgerService::new(db.clone())
        .record_movement(&created.id, "check-in", 2, &Actor::new("u1", "Tester"), Some("Restock".to_string()))
        .await
        .unwrap();

    let export = manager(&db).export_json().await.unwrap();
    assert!(export.filename.starts_with("inventrack_export_"));
    assert!(export.filename.ends_with(".json"));

    let json: serde_json::Value = serde_json::from_str(&export.to_pretty_json().unwrap()).unwrap();
    assert_eq!(json["app"], "InvenTrack");
    assert!(json["exportedAt"].is_string());
    assert_eq!(json["data"]["assets"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["transactions"][0]["type"], "check-in");
    assert_eq!(json["data"]["transactions"][0]["note"], "Restock");

    let users = json["data"]["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].get("password_hash").is_none());
    assert!(users[0].get("passwordHash").is_none());
}
