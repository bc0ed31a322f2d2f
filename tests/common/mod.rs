//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use kanakku::config::StorageConfig;
use kanakku::{CollectionChange, LedgerStore, LiveEntries, Subscription};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// How long to wait for a notification before failing.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// A ledger file inside its own temporary directory.
pub struct TestLedger {
    pub dir: TempDir,
    pub store: LedgerStore,
}

impl TestLedger {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = LedgerStore::new(StorageConfig::at(db_path(&dir).to_string_lossy()));
        Self { dir, store }
    }

    pub fn path(&self) -> PathBuf {
        db_path(&self.dir)
    }

    /// Second store over the same file, as after an application restart.
    pub fn reopen(&self) -> LedgerStore {
        LedgerStore::new(StorageConfig::at(self.path().to_string_lossy()))
    }
}

pub fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("ledger").join("kanakku.db")
}

/// Subscribe and forward every notification into a channel.
pub async fn watch(entries: &LiveEntries) -> (Subscription, mpsc::UnboundedReceiver<CollectionChange>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = entries
        .subscribe(move |change| {
            let _ = tx.send(change.clone());
        })
        .await
        .expect("Failed to subscribe");
    (subscription, rx)
}

/// Next notification, failing the test on timeout.
pub async fn next_change(rx: &mut mpsc::UnboundedReceiver<CollectionChange>) -> CollectionChange {
    tokio::time::timeout(NOTIFY_TIMEOUT, rx.recv())
        .await
        .expect("Timed out waiting for notification")
        .expect("Subscription channel closed")
}

/// Assert nothing arrives within a short window.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<CollectionChange>) {
    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "Unexpected notification: {:?}", got);
}
