//! Observer list for live collections.
//!
//! Each subscriber owns an unbounded queue drained by its own tokio task,
//! so publishing after a commit never blocks on a slow callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::model::LedgerEntry;

/// What a notification reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// First delivery after subscribing.
    Initial,
    Inserted { id: String },
    Modified { ids: Vec<String> },
    Deleted { id: String },
}

/// One notification: the change and the collection as of that commit.
#[derive(Debug, Clone)]
pub struct CollectionChange {
    pub kind: ChangeKind,
    /// Entries ordered by `order` ascending.
    pub entries: Arc<Vec<LedgerEntry>>,
}

type Sender = mpsc::UnboundedSender<Arc<CollectionChange>>;

#[derive(Default)]
pub(crate) struct Notifier {
    observers: Mutex<HashMap<u64, Sender>>,
    next_id: AtomicU64,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a callback and seed its queue with `initial`.
    pub(crate) fn register<F>(
        self: &Arc<Self>,
        initial: CollectionChange,
        callback: F,
    ) -> Subscription
    where
        F: Fn(&CollectionChange) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<CollectionChange>>();

        // Unbounded send only fails once the receiver is gone.
        let _ = tx.send(Arc::new(initial));
        self.lock().insert(id, tx);

        let task = tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                callback(&change);
            }
        });

        debug!(subscription = id, "Subscriber registered");

        Subscription {
            id,
            notifier: Arc::downgrade(self),
            task,
        }
    }

    /// Queue `change` for every registered subscriber.
    pub(crate) fn publish(&self, change: CollectionChange) {
        let change = Arc::new(change);
        let mut observers = self.lock();
        observers.retain(|_, tx| tx.send(change.clone()).is_ok());
        debug!(
            subscribers = observers.len(),
            kind = ?change.kind,
            "Dispatched collection change"
        );
    }

    pub(crate) fn detach(&self, id: u64) {
        self.lock().remove(&id);
    }

    pub(crate) fn detach_all(&self) {
        self.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Sender>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for one registered callback.
///
/// Delivery stops when the handle is unsubscribed or dropped.
#[must_use = "dropping a Subscription stops delivery"]
pub struct Subscription {
    id: u64,
    notifier: Weak<Notifier>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop delivery to this subscriber.
    pub fn unsubscribe(self) {
        debug!(subscription = self.id, "Subscriber removed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.detach(self.id);
        }
        self.task.abort();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
