//! Kanakku - local expense ledger store
//!
//! Persists ledger entries (planned vs. actual amounts) in an embedded
//! SQLite file, records every field edit as an immutable history row,
//! and exposes a live, subscribable view of the entry collection.

pub mod config;
pub mod live;
pub mod model;
pub mod preferences;
pub mod storage;
pub mod summary;
pub mod utils;

pub use live::{ChangeKind, CollectionChange, LiveEntries, Subscription};
pub use model::{ChangedField, FieldUpdate, HistoryEntry, LedgerEntry, OrderUpdate};
pub use storage::{Connection, LedgerStore, StorageError};
