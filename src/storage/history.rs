//! History recorder.
//!
//! Every accepted field edit appends exactly one row here, inside the
//! same transaction as the edit itself. Rows are never updated; they are
//! only removed together with their owning entry.

use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::model::{FieldUpdate, HistoryEntry};

use super::helpers::{format_timestamp, history_from_row};
use super::schema::History;
use super::Result;

/// Suffix appended to the rendered value ("changed to <value>").
pub const DESCRIPTION_SUFFIX: &str = "-ஆக திருத்தப்பட்டது";

/// Render the human-readable description of an edit.
pub fn describe(update: &FieldUpdate) -> String {
    match update {
        FieldUpdate::Title(title) => format!("{}{}", title, DESCRIPTION_SUFFIX),
        FieldUpdate::Planned(value) | FieldUpdate::Actual(value) => {
            format!("{}{}", value, DESCRIPTION_SUFFIX)
        }
    }
}

/// Append a history row for `update` within an already-started transaction.
pub async fn record(
    conn: &mut SqliteConnection,
    entry_id: &str,
    update: &FieldUpdate,
) -> Result<HistoryEntry> {
    let entry = HistoryEntry {
        id: Uuid::new_v4().to_string(),
        entry_id: entry_id.to_string(),
        timestamp: Utc::now(),
        changed_field: update.field(),
        description: describe(update),
    };

    let query = Query::insert()
        .into_table(History::Table)
        .columns([
            History::Id,
            History::EntryId,
            History::RecordedAt,
            History::ChangedField,
            History::Description,
        ])
        .values_panic([
            entry.id.clone().into(),
            entry.entry_id.clone().into(),
            format_timestamp(&entry.timestamp).into(),
            entry.changed_field.as_str().into(),
            entry.description.clone().into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;

    Ok(entry)
}

/// Remove every history row of `entry_id` within an already-started transaction.
pub async fn purge(conn: &mut SqliteConnection, entry_id: &str) -> Result<u64> {
    let query = Query::delete()
        .from_table(History::Table)
        .and_where(Expr::col(History::EntryId).eq(entry_id))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Point-in-time audit trail of `entry_id`, newest first.
///
/// Rows are append-only, so insertion order (`rowid`) is the edit order;
/// the stored wall-clock timestamp is not trusted to be monotonic.
pub async fn list(pool: &SqlitePool, entry_id: &str) -> Result<Vec<HistoryEntry>> {
    let query = Query::select()
        .columns([
            History::Id,
            History::EntryId,
            History::RecordedAt,
            History::ChangedField,
            History::Description,
        ])
        .from(History::Table)
        .and_where(Expr::col(History::EntryId).eq(entry_id))
        .order_by_expr(Expr::cust("rowid"), Order::Desc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(pool).await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        entries.push(history_from_row(&row)?);
    }

    Ok(entries)
}
