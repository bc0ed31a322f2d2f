//! Ledger store: lifecycle and mutation API.
//!
//! Every mutation runs in one transaction on the shared connection; once
//! a call returns `Ok`, the change is committed, the live index reflects
//! it, and subscribers have been queued a notification.

use std::sync::Arc;

use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::live::LiveEntries;
use crate::model::{ChangedField, FieldUpdate, HistoryEntry, LedgerEntry, OrderUpdate};

use super::connection::Connection;
use super::helpers::{entry_from_row, normalize_amount};
use super::history;
use super::schema::Entries;
use super::{Result, StorageError};

enum State {
    Unopened,
    Open(Arc<Connection>),
    Closed,
}

/// Durable, transactional store of ledger entries and their history.
///
/// Construction does no I/O; the connection opens on first use or on an
/// explicit [`LedgerStore::open`]. After [`LedgerStore::close`], every
/// operation fails with [`StorageError::StoreClosed`] until `open` is
/// called again.
pub struct LedgerStore {
    config: StorageConfig,
    state: Mutex<State>,
}

impl LedgerStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Unopened),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Open the backing database, applying any schema upgrade first.
    ///
    /// Idempotent: an open store returns its existing connection.
    pub async fn open(&self) -> Result<Arc<Connection>> {
        let mut state = self.state.lock().await;
        if let State::Open(conn) = &*state {
            return Ok(conn.clone());
        }

        let conn = Arc::new(Connection::open(&self.config).await?);
        *state = State::Open(conn.clone());
        Ok(conn)
    }

    /// Release the connection. Safe to call repeatedly or before any open.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if !matches!(*state, State::Open(_)) {
            return;
        }
        if let State::Open(conn) = std::mem::replace(&mut *state, State::Closed) {
            conn.close().await;
        }
    }

    pub async fn is_open(&self) -> bool {
        matches!(&*self.state.lock().await, State::Open(_))
    }

    async fn connection(&self) -> Result<Arc<Connection>> {
        let mut state = self.state.lock().await;
        match &*state {
            State::Open(conn) => Ok(conn.clone()),
            State::Closed => Err(StorageError::StoreClosed),
            State::Unopened => {
                let conn = Arc::new(Connection::open(&self.config).await?);
                *state = State::Open(conn.clone());
                Ok(conn)
            }
        }
    }

    /// Live collection of all entries, ordered by `order` ascending.
    pub async fn list_entries(&self) -> Result<LiveEntries> {
        Ok(self.connection().await?.entries())
    }

    /// Latest committed state of one entry.
    pub async fn get_entry(&self, id: &str) -> Result<Option<LedgerEntry>> {
        self.connection().await?.index().get(id).await
    }

    /// Audit trail of `entry_id`, newest first. Not live.
    pub async fn get_history(&self, entry_id: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.connection().await?;
        history::list(conn.reader()?, entry_id).await
    }

    /// Create an entry placed after every existing one. Returns its id.
    ///
    /// A blank title is accepted here; rejecting it is the caller's job.
    #[tracing::instrument(name = "ledger.add_entry", skip_all)]
    pub async fn add_entry(&self, title: &str, planned: f64, actual: f64) -> Result<String> {
        let planned = normalize_amount(ChangedField::Planned, planned)?;
        let actual = normalize_amount(ChangedField::Actual, actual)?;

        let conn = self.connection().await?;
        let mut tx = conn.begin().await?;
        let result = Self::insert_entry(tx.conn()?, title, planned, actual).await;
        let entry = tx.finish(result).await?;

        info!(id = %entry.id, order = entry.order, "Entry added");
        let id = entry.id.clone();
        conn.index().insert(entry).await;

        Ok(id)
    }

    /// Write one field and append its history row atomically.
    #[tracing::instrument(name = "ledger.update_field", skip_all, fields(id = %id, field = %update.field()))]
    pub async fn update_field(&self, id: &str, update: FieldUpdate) -> Result<HistoryEntry> {
        let update = match update {
            FieldUpdate::Planned(v) => FieldUpdate::Planned(normalize_amount(ChangedField::Planned, v)?),
            FieldUpdate::Actual(v) => FieldUpdate::Actual(normalize_amount(ChangedField::Actual, v)?),
            title => title,
        };

        let conn = self.connection().await?;
        let mut tx = conn.begin().await?;
        let result = Self::write_field(tx.conn()?, id, &update).await;
        let (entry, record) = tx.finish(result).await?;

        debug!(description = %record.description, "Field updated");
        conn.index().replace(entry).await;

        Ok(record)
    }

    /// Flip `completed`. An unknown id is a silent no-op.
    #[tracing::instrument(name = "ledger.toggle_completed", skip_all, fields(id = %id))]
    pub async fn toggle_completed(&self, id: &str) -> Result<()> {
        let conn = self.connection().await?;
        let mut tx = conn.begin().await?;
        let result = Self::flip_completed(tx.conn()?, id).await;

        match tx.finish(result).await? {
            Some(entry) => {
                debug!(completed = entry.completed, "Entry toggled");
                conn.index().replace(entry).await;
            }
            None => warn!("Toggle ignored for unknown entry"),
        }

        Ok(())
    }

    /// Apply a batch of `(id, order)` pairs in one transaction.
    ///
    /// Unknown ids are skipped rather than failing the batch. Returns the
    /// number of updates applied.
    #[tracing::instrument(name = "ledger.reorder", skip_all)]
    pub async fn reorder<I, U>(&self, updates: I) -> Result<usize>
    where
        I: IntoIterator<Item = U>,
        U: Into<OrderUpdate>,
    {
        let updates: Vec<OrderUpdate> = updates.into_iter().map(Into::into).collect();

        let conn = self.connection().await?;
        let mut tx = conn.begin().await?;
        let result = Self::write_orders(tx.conn()?, &updates).await;
        let applied = tx.finish(result).await?;

        if applied.len() < updates.len() {
            warn!(
                requested = updates.len(),
                applied = applied.len(),
                "Reorder skipped unknown entries"
            );
        }
        debug!(applied = applied.len(), "Entries reordered");
        conn.index().set_orders(&applied).await;

        Ok(applied.len())
    }

    /// Reorder so that each id's `order` equals its position in `ids`.
    pub async fn reorder_by_position<S: AsRef<str>>(&self, ids: &[S]) -> Result<usize> {
        let updates = ids
            .iter()
            .enumerate()
            .map(|(position, id)| OrderUpdate::new(id.as_ref(), position as i64));
        self.reorder(updates).await
    }

    /// Delete an entry together with all of its history rows.
    #[tracing::instrument(name = "ledger.delete_entry", skip_all, fields(id = %id))]
    pub async fn delete_entry(&self, id: &str) -> Result<()> {
        let conn = self.connection().await?;
        let mut tx = conn.begin().await?;
        let result = Self::remove_entry(tx.conn()?, id).await;
        let purged = tx.finish(result).await?;

        info!(history_rows = purged, "Entry deleted");
        conn.index().remove(id).await;

        Ok(())
    }

    async fn fetch_entry(conn: &mut SqliteConnection, id: &str) -> Result<Option<LedgerEntry>> {
        let query = Query::select()
            .columns([
                Entries::Id,
                Entries::Title,
                Entries::Planned,
                Entries::Actual,
                Entries::Completed,
                Entries::SortOrder,
            ])
            .from(Entries::Table)
            .and_where(Expr::col(Entries::Id).eq(id))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn require_entry(conn: &mut SqliteConnection, id: &str) -> Result<LedgerEntry> {
        Self::fetch_entry(conn, id)
            .await?
            .ok_or_else(|| StorageError::EntryNotFound { id: id.to_string() })
    }

    async fn insert_entry(
        conn: &mut SqliteConnection,
        title: &str,
        planned: f64,
        actual: f64,
    ) -> Result<LedgerEntry> {
        let max_order = {
            let query = Query::select()
                .expr(Expr::col(Entries::SortOrder).max())
                .from(Entries::Table)
                .to_string(SqliteQueryBuilder);

            let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
            match row {
                Some(row) => row.try_get::<Option<i64>, _>(0)?,
                None => None,
            }
        };

        let max_order = max_order.unwrap_or(0);
        let order = max_order
            .checked_add(1)
            .ok_or(StorageError::OrderOverflow { max: max_order })?;

        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            planned,
            actual,
            completed: false,
            order,
        };

        let query = Query::insert()
            .into_table(Entries::Table)
            .columns([
                Entries::Id,
                Entries::Title,
                Entries::Planned,
                Entries::Actual,
                Entries::Completed,
                Entries::SortOrder,
            ])
            .values_panic([
                entry.id.clone().into(),
                entry.title.clone().into(),
                entry.planned.into(),
                entry.actual.into(),
                entry.completed.into(),
                entry.order.into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&mut *conn).await?;

        Ok(entry)
    }

    async fn write_field(
        conn: &mut SqliteConnection,
        id: &str,
        update: &FieldUpdate,
    ) -> Result<(LedgerEntry, HistoryEntry)> {
        let mut entry = Self::require_entry(conn, id).await?;

        let mut query = Query::update();
        query.table(Entries::Table);
        match update {
            FieldUpdate::Title(title) => {
                query.value(Entries::Title, title.clone());
                entry.title = title.clone();
            }
            FieldUpdate::Planned(value) => {
                query.value(Entries::Planned, *value);
                entry.planned = *value;
            }
            FieldUpdate::Actual(value) => {
                query.value(Entries::Actual, *value);
                entry.actual = *value;
            }
        }
        let query = query
            .and_where(Expr::col(Entries::Id).eq(id))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&mut *conn).await?;
        let record = history::record(conn, id, update).await?;

        Ok((entry, record))
    }

    async fn flip_completed(conn: &mut SqliteConnection, id: &str) -> Result<Option<LedgerEntry>> {
        let Some(mut entry) = Self::fetch_entry(conn, id).await? else {
            return Ok(None);
        };
        entry.completed = !entry.completed;

        let query = Query::update()
            .table(Entries::Table)
            .value(Entries::Completed, entry.completed)
            .and_where(Expr::col(Entries::Id).eq(id))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&mut *conn).await?;

        Ok(Some(entry))
    }

    async fn write_orders(
        conn: &mut SqliteConnection,
        updates: &[OrderUpdate],
    ) -> Result<Vec<OrderUpdate>> {
        let mut applied = Vec::with_capacity(updates.len());

        for update in updates {
            let query = Query::update()
                .table(Entries::Table)
                .value(Entries::SortOrder, update.order)
                .and_where(Expr::col(Entries::Id).eq(update.id.as_str()))
                .to_string(SqliteQueryBuilder);

            let result = sqlx::query(&query).execute(&mut *conn).await?;
            if result.rows_affected() > 0 {
                applied.push(update.clone());
            } else {
                debug!(id = %update.id, "Reorder skipping unknown entry");
            }
        }

        Ok(applied)
    }

    async fn remove_entry(conn: &mut SqliteConnection, id: &str) -> Result<u64> {
        Self::require_entry(conn, id).await?;

        let purged = history::purge(conn, id).await?;

        let query = Query::delete()
            .from_table(Entries::Table)
            .and_where(Expr::col(Entries::Id).eq(id))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&mut *conn).await?;

        Ok(purged)
    }
}
