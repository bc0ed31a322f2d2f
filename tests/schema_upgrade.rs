//! Schema upgrade integration tests.
//!
//! Run with: cargo test --test schema_upgrade
//!
//! Builds database files in older layouts with raw SQL, then opens them
//! through the store.

mod common;

use std::path::Path;

use common::TestLedger;
use kanakku::storage::schema::SCHEMA_VERSION;
use kanakku::{FieldUpdate, StorageError};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, SqliteConnection};

async fn raw_connection(path: &Path) -> SqliteConnection {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqliteConnection::connect_with(&options)
        .await
        .expect("Failed to create legacy database")
}

/// A version-2 file: entries without an ordering column, no history table.
async fn write_v2_file(path: &Path, titles: &[&str]) {
    let mut conn = raw_connection(path).await;

    sqlx::query(
        "CREATE TABLE entries (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            planned REAL NOT NULL DEFAULT 0,
            actual REAL NOT NULL DEFAULT 0,
            completed INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(&mut conn)
    .await
    .unwrap();

    for (i, title) in titles.iter().enumerate() {
        sqlx::query("INSERT INTO entries (id, title, planned, actual, completed) VALUES (?, ?, ?, 0, 0)")
            .bind(format!("legacy-{i}"))
            .bind(*title)
            .bind((i as f64 + 1.0) * 100.0)
            .execute(&mut conn)
            .await
            .unwrap();
    }

    sqlx::query("PRAGMA user_version = 2")
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
}

async fn user_version(path: &Path) -> i64 {
    let mut conn = raw_connection(path).await;
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
    version
}

#[tokio::test]
async fn test_v2_file_gains_default_orders() {
    let ledger = TestLedger::new();
    write_v2_file(&ledger.path(), &["அரிசி", "பருப்பு", "எண்ணெய்"]).await;

    let conn = ledger.store.open().await.unwrap();
    assert_eq!(conn.upgraded_from(), 2);

    let entries = ledger.store.list_entries().await.unwrap().snapshot().await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.order == 0));

    // Equal orders fall back to insertion order.
    let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["அரிசி", "பருப்பு", "எண்ணெய்"]);

    ledger.store.close().await;
    assert_eq!(user_version(&ledger.path()).await, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_upgraded_file_is_fully_usable() {
    let ledger = TestLedger::new();
    write_v2_file(&ledger.path(), &["old"]).await;

    let new_id = ledger.store.add_entry("new", 50.0, 0.0).await.unwrap();
    let new_entry = ledger.store.get_entry(&new_id).await.unwrap().unwrap();
    assert_eq!(new_entry.order, 1);

    ledger
        .store
        .update_field("legacy-0", FieldUpdate::Title("renamed".to_string()))
        .await
        .unwrap();
    let history = ledger.store.get_history("legacy-0").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "renamed-ஆக திருத்தப்பட்டது");
}

#[tokio::test]
async fn test_upgrade_runs_once() {
    let ledger = TestLedger::new();
    write_v2_file(&ledger.path(), &["a"]).await;

    ledger.store.open().await.unwrap();
    ledger.store.close().await;

    let reopened = ledger.reopen();
    let conn = reopened.open().await.unwrap();
    assert_eq!(conn.upgraded_from(), SCHEMA_VERSION);
}

#[tokio::test]
async fn test_fresh_file_reports_version_zero() {
    let ledger = TestLedger::new();
    let conn = ledger.store.open().await.unwrap();
    assert_eq!(conn.upgraded_from(), 0);
}

#[tokio::test]
async fn test_newer_version_is_rejected() {
    let ledger = TestLedger::new();
    {
        let mut conn = raw_connection(&ledger.path()).await;
        sqlx::query("PRAGMA user_version = 99")
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
    }

    let err = ledger.store.open().await.unwrap_err();
    assert!(
        matches!(
            err,
            StorageError::UnsupportedSchemaVersion { found: 99, supported: SCHEMA_VERSION }
        ),
        "got {err:?}"
    );
    assert!(err.is_open_error());

    // The file is left untouched.
    assert_eq!(user_version(&ledger.path()).await, 99);
}
