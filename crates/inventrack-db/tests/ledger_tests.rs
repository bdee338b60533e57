//! Ledger and repository behavior against a real embedded store.

use chrono::{TimeZone, Utc};

use inventrack_core::{
    AssetFilter, AssetUpdate, CoreError, MovementFilter, MovementType, NewAsset, NewUser, Role,
    UserUpdate, DEFAULT_ADMIN_USERNAME,
};
use inventrack_db::{Actor, Database, DbConfig, DbError, LedgerService, ServiceError};

async fn open(dir: &tempfile::TempDir) -> Database {
    Database::connect(
        DbConfig::embedded(dir.path().join("inventrack.db"))
            .flush_interval(None)
            .admin_password("test-admin-pw"),
    )
    .await
    .unwrap()
}

fn laptop(quantity: i64) -> NewAsset {
    NewAsset {
        name: "Laptop".to_string(),
        category: "Elektronik".to_string(),
        sku: Some("ELE-000001".to_string()),
        quantity,
        location: "Gudang A".to_string(),
        ..Default::default()
    }
}

fn tester() -> Actor {
    Actor::new("user-1", "Tester")
}

#[tokio::test]
async fn test_check_in_check_out_and_cascade() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let ledger = LedgerService::new(db.clone());

    let asset = db.assets().create(laptop(10)).await.unwrap();

    ledger
        .record_movement(&asset.id, "check-out", 4, &tester(), Some("Dipinjam".to_string()))
        .await
        .unwrap();
    assert_eq!(db.assets().get_by_id(&asset.id).await.unwrap().unwrap().quantity, 6);

    let err = ledger
        .record_movement(&asset.id, "check-out", 10, &tester(), None)
        .await
        .unwrap_err();
    match err {
        ServiceError::Core(CoreError::InsufficientStock { available, requested, .. }) => {
            assert_eq!(available, 6);
            assert_eq!(requested, 10);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(db.movements().count_for_asset(&asset.id).await.unwrap(), 1);

    ledger
        .record_movement(&asset.id, "check-in", 3, &tester(), None)
        .await
        .unwrap();
    assert_eq!(db.assets().get_by_id(&asset.id).await.unwrap().unwrap().quantity, 9);

    let history = db.movements().list_for_asset(&asset.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .any(|m| m.movement_type == MovementType::CheckIn && m.quantity == 3));

    db.assets().delete(&asset.id).await.unwrap();
    assert!(db.assets().get_by_id(&asset.id).await.unwrap().is_none());
    assert_eq!(db.movements().count_for_asset(&asset.id).await.unwrap(), 0);

    db.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_check_outs_resolve_to_one_success() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let ledger = LedgerService::new(db.clone());
    let asset = db.assets().create(laptop(10)).await.unwrap();

    let first = {
        let ledger = ledger.clone();
        let id = asset.id.clone();
        tokio::spawn(async move { ledger.record_movement(&id, "check-out", 6, &tester(), None).await })
    };
    let second = {
        let ledger = ledger.clone();
        let id = asset.id.clone();
        tokio::spawn(async move { ledger.record_movement(&id, "check-out", 6, &tester(), None).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(ServiceError::Core(CoreError::InsufficientStock { available: 4, .. }))
    )));

    assert_eq!(db.assets().get_by_id(&asset.id).await.unwrap().unwrap().quantity, 4);
    assert_eq!(db.movements().count_for_asset(&asset.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_movement_on_missing_asset() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let ledger = LedgerService::new(db.clone());

    let err = ledger
        .record_movement("no-such-asset", "check-in", 1, &tester(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Core(CoreError::AssetNotFound(_))));

    let err = ledger
        .record_movement("no-such-asset", "check-in", 0, &tester(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let ledger = LedgerService::new(db.clone());

    let asset = db.assets().create(laptop(10)).await.unwrap();
    ledger
        .record_movement(&asset.id, "check-out", 2, &tester(), None)
        .await
        .unwrap();
    db.shutdown().await.unwrap();

    let reopened = open(&dir).await;
    let reloaded = reopened.assets().get_by_id(&asset.id).await.unwrap().unwrap();
    assert_eq!(reloaded.quantity, 8);
    assert_eq!(reopened.movements().count_for_asset(&asset.id).await.unwrap(), 1);
    // The admin is only seeded into an empty user table.
    assert_eq!(reopened.users().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_asset_crud_and_filters() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let assets = db.assets();

    let first = assets.create(laptop(10)).await.unwrap();
    assert_eq!(first.condition, inventrack_core::DEFAULT_CONDITION);

    let chair = assets
        .create(NewAsset {
            name: "Kursi Kantor".to_string(),
            category: "Furnitur".to_string(),
            sku: None,
            quantity: 2,
            condition: Some("Baik".to_string()),
            location: "Gudang B".to_string(),
        })
        .await
        .unwrap();
    assert!(chair.sku.starts_with("FUR-"));

    let err = assets.create(laptop(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Db(DbError::UniqueViolation { ref field, .. }) if field == "sku"
    ));

    let found = assets
        .list(&AssetFilter {
            search: Some("KURSI".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, chair.id);

    let in_gudang_a = assets
        .list(&AssetFilter {
            location: Some("Gudang A".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(in_gudang_a.len(), 1);

    let updated = assets
        .update(
            &chair.id,
            AssetUpdate {
                quantity: Some(7),
                location: Some("Gudang C".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.quantity, 7);
    assert_eq!(updated.location, "Gudang C");
    assert_eq!(updated.name, "Kursi Kantor");

    assert_eq!(
        assets.categories().await.unwrap(),
        vec!["Elektronik".to_string(), "Furnitur".to_string()]
    );
    assert_eq!(
        assets.locations().await.unwrap(),
        vec!["Gudang A".to_string(), "Gudang C".to_string()]
    );

    let err = assets.delete("missing").await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(CoreError::AssetNotFound(_))));
}

#[tokio::test]
async fn test_summary_and_monthly_stats() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let ledger = LedgerService::new(db.clone());

    let asset = db.assets().create(laptop(10)).await.unwrap();
    db.assets()
        .create(NewAsset {
            name: "Proyektor".to_string(),
            category: "Elektronik".to_string(),
            sku: Some("ELE-000002".to_string()),
            quantity: 3,
            location: "Ruang Rapat".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    ledger
        .record_movement(&asset.id, "check-out", 4, &tester(), None)
        .await
        .unwrap();
    ledger
        .record_movement(&asset.id, "check-in", 1, &tester(), None)
        .await
        .unwrap();

    let summary = db.assets().summary().await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.total_quantity, 10);
    assert_eq!(summary.low_stock, 1);
    assert_eq!(summary.check_in_this_month, 1);
    assert_eq!(summary.check_out_this_month, 4);

    let low = db.assets().low_stock().await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].sku, "ELE-000002");

    let stats = db.movements().monthly_stats(6).await.unwrap();
    assert_eq!(stats.len(), 6);
    let current = stats.last().unwrap();
    assert_eq!(current.label, Utc::now().format("%Y-%m").to_string());
    assert_eq!((current.check_in, current.check_out), (1, 4));
    assert!(stats[..5].iter().all(|m| m.check_in == 0 && m.check_out == 0));

    // Windows relative to an earlier "now" exclude today's movements.
    let past = Utc.with_ymd_and_hms(2020, 3, 15, 0, 0, 0).unwrap();
    let old_stats = db.movements().monthly_stats_at(past, 3).await.unwrap();
    assert_eq!(
        old_stats.iter().map(|m| m.label.as_str()).collect::<Vec<_>>(),
        vec!["2020-01", "2020-02", "2020-03"]
    );
    assert!(old_stats.iter().all(|m| m.check_in == 0 && m.check_out == 0));

    let outs = db
        .movements()
        .list(&MovementFilter {
            movement_type: Some(MovementType::CheckOut),
            search: Some("tester".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(outs.len(), 1);
}

#[tokio::test]
async fn test_users_and_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let users = db.users();

    let admin = users
        .verify_credentials(DEFAULT_ADMIN_USERNAME, "test-admin-pw")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin.role, Role::Admin);
    assert!(users
        .verify_credentials(DEFAULT_ADMIN_USERNAME, "wrong")
        .await
        .unwrap()
        .is_none());

    let staff = users
        .create(NewUser {
            username: "budi".to_string(),
            password: "rahasia123".to_string(),
            name: "Budi".to_string(),
            role: Some("superuser".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(staff.role, Role::Staff);
    assert_ne!(staff.password_hash, "rahasia123");

    let err = users
        .create(NewUser {
            username: "budi".to_string(),
            password: "rahasia123".to_string(),
            name: "Budi Lain".to_string(),
            role: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Db(DbError::UniqueViolation { ref field, .. }) if field == "username"
    ));

    let short = users
        .create(NewUser {
            username: "ani".to_string(),
            password: "123".to_string(),
            name: "Ani".to_string(),
            role: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(short, ServiceError::Core(CoreError::Validation(_))));

    users
        .update(
            &staff.id,
            UserUpdate {
                password: Some("baru-456".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(users.verify_credentials("budi", "baru-456").await.unwrap().is_some());
    assert!(users.verify_credentials("budi", "rahasia123").await.unwrap().is_none());

    let err = users.delete(&admin.id, &admin.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(CoreError::SelfDeletion)));

    users.delete(&staff.id, &admin.id).await.unwrap();
    assert_eq!(users.count().await.unwrap(), 1);
}
