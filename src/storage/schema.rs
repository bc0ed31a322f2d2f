//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Current on-disk schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 3;

/// Ledger entries table schema.
#[derive(Iden)]
pub enum Entries {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "title"]
    Title,
    #[iden = "planned"]
    Planned,
    #[iden = "actual"]
    Actual,
    #[iden = "completed"]
    Completed,
    #[iden = "sort_order"]
    SortOrder,
}

/// History table schema.
#[derive(Iden)]
pub enum History {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "entry_id"]
    EntryId,
    #[iden = "recorded_at"]
    RecordedAt,
    #[iden = "changed_field"]
    ChangedField,
    #[iden = "description"]
    Description,
}

/// SQL for creating the entries table.
pub const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    planned REAL NOT NULL DEFAULT 0,
    actual REAL NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER NOT NULL DEFAULT 0
)
"#;

/// SQL for creating the history table.
pub const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS history (
    id TEXT PRIMARY KEY NOT NULL,
    entry_id TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    changed_field TEXT NOT NULL,
    description TEXT NOT NULL
)
"#;

/// SQL for the history lookup index.
pub const CREATE_HISTORY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_history_entry ON history(entry_id)";

/// SQL adding the ordering column to pre-v3 entries tables.
pub const ADD_SORT_ORDER_COLUMN: &str =
    "ALTER TABLE entries ADD COLUMN sort_order INTEGER NOT NULL DEFAULT 0";
