//! Live collection and subscription integration tests.
//!
//! Run with: cargo test --test live_query

mod common;

use common::{assert_quiet, next_change, watch, TestLedger};
use kanakku::{ChangeKind, FieldUpdate, StorageError};

#[tokio::test]
async fn test_initial_delivery_is_current_snapshot() {
    let ledger = TestLedger::new();
    let a = ledger.store.add_entry("A", 10.0, 0.0).await.unwrap();
    let b = ledger.store.add_entry("B", 20.0, 0.0).await.unwrap();

    let entries = ledger.store.list_entries().await.unwrap();
    let (_sub, mut rx) = watch(&entries).await;

    let change = next_change(&mut rx).await;
    assert_eq!(change.kind, ChangeKind::Initial);
    let ids: Vec<&str> = change.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![a.as_str(), b.as_str()]);
}

#[tokio::test]
async fn test_initial_delivery_on_empty_store() {
    let ledger = TestLedger::new();
    let entries = ledger.store.list_entries().await.unwrap();
    let (_sub, mut rx) = watch(&entries).await;

    let change = next_change(&mut rx).await;
    assert_eq!(change.kind, ChangeKind::Initial);
    assert!(change.entries.is_empty());
}

#[tokio::test]
async fn test_two_subscribers_see_the_same_update() {
    let ledger = TestLedger::new();
    let id = ledger.store.add_entry("வாடகை", 5000.0, 0.0).await.unwrap();

    let entries = ledger.store.list_entries().await.unwrap();
    let (_first, mut rx1) = watch(&entries).await;
    let (_second, mut rx2) = watch(&entries).await;
    next_change(&mut rx1).await;
    next_change(&mut rx2).await;

    ledger
        .store
        .update_field(&id, FieldUpdate::Actual(4800.0))
        .await
        .unwrap();

    for rx in [&mut rx1, &mut rx2] {
        let change = next_change(rx).await;
        assert_eq!(change.kind, ChangeKind::Modified { ids: vec![id.clone()] });
        assert_eq!(change.entries[0].actual, 4800.0);
    }
}

#[tokio::test]
async fn test_unsubscribe_one_keeps_the_other() {
    let ledger = TestLedger::new();
    let entries = ledger.store.list_entries().await.unwrap();

    let (first, mut rx1) = watch(&entries).await;
    let (_second, mut rx2) = watch(&entries).await;
    next_change(&mut rx1).await;
    next_change(&mut rx2).await;
    assert_eq!(entries.subscriber_count(), 2);

    first.unsubscribe();
    assert_eq!(entries.subscriber_count(), 1);

    let id = ledger.store.add_entry("பெட்ரோல்", 900.0, 0.0).await.unwrap();

    let change = next_change(&mut rx2).await;
    assert_eq!(change.kind, ChangeKind::Inserted { id });
    // The first callback was dropped with its task, closing the channel.
    assert!(rx1.recv().await.is_none());
}

#[tokio::test]
async fn test_every_mutation_notifies() {
    let ledger = TestLedger::new();
    let a = ledger.store.add_entry("A", 1.0, 0.0).await.unwrap();
    let b = ledger.store.add_entry("B", 2.0, 0.0).await.unwrap();

    let entries = ledger.store.list_entries().await.unwrap();
    let (_sub, mut rx) = watch(&entries).await;
    next_change(&mut rx).await;

    ledger.store.toggle_completed(&a).await.unwrap();
    let change = next_change(&mut rx).await;
    assert_eq!(change.kind, ChangeKind::Modified { ids: vec![a.clone()] });
    assert!(change.entries[0].completed);

    ledger
        .store
        .reorder([(a.clone(), 2i64), (b.clone(), 1i64)])
        .await
        .unwrap();
    let change = next_change(&mut rx).await;
    assert!(matches!(change.kind, ChangeKind::Modified { ref ids } if ids.len() == 2));
    let ids: Vec<&str> = change.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![b.as_str(), a.as_str()]);

    ledger.store.delete_entry(&b).await.unwrap();
    let change = next_change(&mut rx).await;
    assert_eq!(change.kind, ChangeKind::Deleted { id: b });
    assert_eq!(change.entries.len(), 1);
}

#[tokio::test]
async fn test_noop_commits_do_not_notify() {
    let ledger = TestLedger::new();
    ledger.store.add_entry("A", 1.0, 0.0).await.unwrap();

    let entries = ledger.store.list_entries().await.unwrap();
    let (_sub, mut rx) = watch(&entries).await;
    next_change(&mut rx).await;

    ledger.store.toggle_completed("missing").await.unwrap();
    let applied = ledger
        .store
        .reorder([("missing".to_string(), 3i64)])
        .await
        .unwrap();
    assert_eq!(applied, 0);

    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_failed_mutation_does_not_notify() {
    let ledger = TestLedger::new();
    let entries = ledger.store.list_entries().await.unwrap();
    let (_sub, mut rx) = watch(&entries).await;
    next_change(&mut rx).await;

    let err = ledger
        .store
        .update_field("missing", FieldUpdate::Planned(1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::EntryNotFound { .. }));

    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_notifications_arrive_in_commit_order() {
    let ledger = TestLedger::new();
    let entries = ledger.store.list_entries().await.unwrap();
    let (_sub, mut rx) = watch(&entries).await;
    next_change(&mut rx).await;

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(ledger.store.add_entry(&format!("e{i}"), 1.0, 0.0).await.unwrap());
    }

    for (i, id) in ids.iter().enumerate() {
        let change = next_change(&mut rx).await;
        assert_eq!(change.kind, ChangeKind::Inserted { id: id.clone() });
        assert_eq!(change.entries.len(), i + 1);
    }
}

#[tokio::test]
async fn test_close_detaches_subscribers() {
    let ledger = TestLedger::new();
    let entries = ledger.store.list_entries().await.unwrap();
    let (_sub, mut rx) = watch(&entries).await;
    next_change(&mut rx).await;

    ledger.store.close().await;

    assert_eq!(entries.subscriber_count(), 0);
    assert!(rx.recv().await.is_none());
    assert!(matches!(
        entries.subscribe(|_| {}).await,
        Err(StorageError::StoreClosed)
    ));
}

#[tokio::test]
async fn test_reopen_gives_fresh_collection() {
    let ledger = TestLedger::new();
    let id = ledger.store.add_entry("A", 1.0, 0.0).await.unwrap();
    let stale = ledger.store.list_entries().await.unwrap();

    ledger.store.close().await;
    ledger.store.open().await.unwrap();

    let fresh = ledger.store.list_entries().await.unwrap();
    assert!(stale.snapshot().await.is_err());
    assert_eq!(fresh.snapshot().await.unwrap()[0].id, id);
}
