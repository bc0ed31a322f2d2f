//! Shared storage helper functions.
//!
//! Row decoding, timestamp encoding and amount normalisation used by the
//! ledger and history code paths.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::model::{ChangedField, HistoryEntry, LedgerEntry};

use super::{Result, StorageError};

/// Encode a timestamp so that lexical order equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored RFC3339 timestamp.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Apply the amount convention: non-finite values are rejected,
/// negative values are stored as zero.
pub fn normalize_amount(field: ChangedField, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(StorageError::InvalidAmount { field, value });
    }
    if value <= 0.0 {
        return Ok(0.0);
    }
    Ok(value)
}

/// Decode a full `entries` row.
pub fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        planned: row.try_get("planned")?,
        actual: row.try_get("actual")?,
        completed: row.try_get("completed")?,
        order: row.try_get("sort_order")?,
    })
}

/// Decode a full `history` row.
pub fn history_from_row(row: &SqliteRow) -> Result<HistoryEntry> {
    let recorded_at: String = row.try_get("recorded_at")?;
    let tag: String = row.try_get("changed_field")?;
    let changed_field = tag
        .parse::<ChangedField>()
        .map_err(|tag| StorageError::UnknownField { tag })?;

    Ok(HistoryEntry {
        id: row.try_get("id")?,
        entry_id: row.try_get("entry_id")?,
        timestamp: parse_timestamp(&recorded_at)?,
        changed_field,
        description: row.try_get("description")?,
    })
}
