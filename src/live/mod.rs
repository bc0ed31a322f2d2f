//! Live entry collection.
//!
//! The connection keeps every ledger entry in an in-memory index that is
//! updated right after each committed transaction. [`LiveEntries`] reads
//! that index directly, so it always reflects the latest commit, and
//! lets callers subscribe to change notifications.

mod notifier;

pub use notifier::{ChangeKind, CollectionChange, Subscription};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::{LedgerEntry, OrderUpdate};
use crate::storage::{Result, StorageError};
use notifier::Notifier;

struct Indexed {
    entry: LedgerEntry,
    /// Insertion rank, breaks ties between equal `order` values.
    rank: u64,
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<String, Indexed>,
    next_rank: u64,
    closed: bool,
}

impl IndexState {
    fn sorted(&self) -> Vec<LedgerEntry> {
        let mut items: Vec<&Indexed> = self.entries.values().collect();
        items.sort_by_key(|item| (item.entry.order, item.rank));
        items.into_iter().map(|item| item.entry.clone()).collect()
    }

    fn push(&mut self, entry: LedgerEntry) {
        let rank = self.next_rank;
        self.next_rank += 1;
        self.entries.insert(entry.id.clone(), Indexed { entry, rank });
    }
}

/// In-memory mirror of the entries table plus its observer list.
///
/// Mutations publish while still holding the write lock, and subscribers
/// take their initial snapshot under the read lock, so every subscriber
/// sees each commit exactly once.
pub(crate) struct EntryIndex {
    state: RwLock<IndexState>,
    notifier: Arc<Notifier>,
}

impl EntryIndex {
    /// Build the index from entries listed in insertion order.
    pub(crate) fn load(entries: Vec<LedgerEntry>) -> Self {
        let mut state = IndexState::default();
        for entry in entries {
            state.push(entry);
        }
        Self {
            state: RwLock::new(state),
            notifier: Arc::new(Notifier::new()),
        }
    }

    pub(crate) async fn insert(&self, entry: LedgerEntry) {
        let mut state = self.state.write().await;
        let id = entry.id.clone();
        state.push(entry);
        self.publish(&state, ChangeKind::Inserted { id });
    }

    /// Replace an existing entry, keeping its insertion rank.
    pub(crate) async fn replace(&self, entry: LedgerEntry) {
        let mut state = self.state.write().await;
        let id = entry.id.clone();
        match state.entries.get_mut(&id) {
            Some(item) => item.entry = entry,
            None => state.push(entry),
        }
        self.publish(&state, ChangeKind::Modified { ids: vec![id] });
    }

    /// Apply already-committed order changes. Empty batches publish nothing.
    pub(crate) async fn set_orders(&self, updates: &[OrderUpdate]) {
        if updates.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        let mut ids = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(item) = state.entries.get_mut(&update.id) {
                item.entry.order = update.order;
                ids.push(update.id.clone());
            }
        }
        self.publish(&state, ChangeKind::Modified { ids });
    }

    pub(crate) async fn remove(&self, id: &str) {
        let mut state = self.state.write().await;
        if state.entries.remove(id).is_some() {
            self.publish(&state, ChangeKind::Deleted { id: id.to_string() });
        }
    }

    /// Invalidate the index and detach every subscriber.
    pub(crate) async fn close(&self) {
        let mut state = self.state.write().await;
        state.closed = true;
        state.entries.clear();
        self.notifier.detach_all();
    }

    pub(crate) async fn snapshot(&self) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        if state.closed {
            return Err(StorageError::StoreClosed);
        }
        Ok(state.sorted())
    }

    pub(crate) async fn get(&self, id: &str) -> Result<Option<LedgerEntry>> {
        let state = self.state.read().await;
        if state.closed {
            return Err(StorageError::StoreClosed);
        }
        Ok(state.entries.get(id).map(|item| item.entry.clone()))
    }

    fn publish(&self, state: &IndexState, kind: ChangeKind) {
        self.notifier.publish(CollectionChange {
            kind,
            entries: Arc::new(state.sorted()),
        });
    }
}

/// Live view over all ledger entries, ordered by `order` ascending.
///
/// Cloning is cheap; every clone reads the same index. After the store is
/// closed, every read fails with [`StorageError::StoreClosed`].
#[derive(Clone)]
pub struct LiveEntries {
    index: Arc<EntryIndex>,
}

impl LiveEntries {
    pub(crate) fn new(index: Arc<EntryIndex>) -> Self {
        Self { index }
    }

    /// Current committed entries, ordered by `order` ascending.
    pub async fn snapshot(&self) -> Result<Vec<LedgerEntry>> {
        self.index.snapshot().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<LedgerEntry>> {
        self.index.get(id).await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.index.snapshot().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Register `callback`.
    ///
    /// The callback runs on its own task: once with the current state
    /// (`ChangeKind::Initial`), then after every commit that changes the
    /// collection. Delivery is asynchronous with respect to the commit.
    pub async fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&CollectionChange) + Send + Sync + 'static,
    {
        let state = self.index.state.read().await;
        if state.closed {
            return Err(StorageError::StoreClosed);
        }
        let initial = CollectionChange {
            kind: ChangeKind::Initial,
            entries: Arc::new(state.sorted()),
        };
        Ok(self.index.notifier.register(initial, callback))
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.index.notifier.len()
    }
}

impl std::fmt::Debug for LiveEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEntries")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
