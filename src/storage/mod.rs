//! Ledger storage.
//!
//! A single SQLite file holds two tables: ledger entries and their
//! history rows. All writes go through [`LedgerStore`], which keeps one
//! shared connection, runs every mutation in one transaction, and feeds
//! the in-memory index behind [`crate::live::LiveEntries`].

pub mod connection;
pub mod helpers;
pub mod history;
pub mod ledger;
pub mod migration;
pub mod schema;

pub use connection::Connection;
pub use ledger::LedgerStore;

use crate::model::ChangedField;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to open store at {path}: {reason}")]
    StoreOpen { path: String, reason: String },

    #[error("Unsupported schema version {found} (supported: up to {supported})")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    #[error("Entry not found: {id}")]
    EntryNotFound { id: String },

    #[error("Store is closed")]
    StoreClosed,

    #[error("No display position left after order {max}")]
    OrderOverflow { max: i64 },

    #[error("Invalid amount for {field}: {value}")]
    InvalidAmount { field: ChangedField, value: f64 },

    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    #[error("Unknown history field tag: {tag}")]
    UnknownField { tag: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// True for failures raised while opening the backing file.
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            StorageError::StoreOpen { .. } | StorageError::UnsupportedSchemaVersion { .. }
        )
    }
}
