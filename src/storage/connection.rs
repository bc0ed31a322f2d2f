//! Shared SQLite connection.
//!
//! The pool is capped at one connection that is never reaped, so every
//! transaction runs on the same handle and commits one at a time. The
//! write gate additionally keeps "commit, then update the live index"
//! atomic with respect to other writers.

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::config::StorageConfig;
use crate::live::{EntryIndex, LiveEntries};
use crate::model::LedgerEntry;

use super::helpers::entry_from_row;
use super::migration;
use super::schema::Entries;
use super::{Result, StorageError};

/// An open ledger database.
///
/// Obtained from [`super::LedgerStore::open`]. Becomes unusable once the
/// store is closed; live collections created from it then fail with
/// [`StorageError::StoreClosed`].
pub struct Connection {
    path: String,
    pool: SqlitePool,
    index: Arc<EntryIndex>,
    write_gate: Mutex<()>,
    closed: AtomicBool,
    upgraded_from: i64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("upgraded_from", &self.upgraded_from)
            .finish_non_exhaustive()
    }
}

/// Exclusive write access: the gate guard plus a connection with an open
/// `BEGIN IMMEDIATE` transaction.
///
/// Dropped without [`WriteTx::finish`] (e.g. a cancelled future), the
/// transaction is rolled back before the connection is handed out again.
pub(crate) struct WriteTx<'a> {
    _gate: MutexGuard<'a, ()>,
    conn: Option<PoolConnection<Sqlite>>,
    finished: bool,
}

impl Connection {
    /// Open (creating if missing) and upgrade the database described by `config`.
    pub(crate) async fn open(config: &StorageConfig) -> Result<Self> {
        let open_error = |reason: String| StorageError::StoreOpen {
            path: config.path.clone(),
            reason,
        };

        let options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| open_error(e.to_string()))?
        } else {
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| open_error(e.to_string()))?;
                }
            }
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
        };
        let options = options.busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| open_error(e.to_string()))?;

        let prepared = Self::prepare(&pool).await.map_err(|e| match e {
            StorageError::Database(err) => open_error(err.to_string()),
            other => other,
        });

        let (upgraded_from, entries) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(path = %config.path, error = %e, "Failed to open ledger store");
                pool.close().await;
                return Err(e);
            }
        };

        info!(
            path = %config.path,
            entries = entries.len(),
            upgraded_from,
            "Ledger store opened"
        );

        Ok(Self {
            path: config.path.clone(),
            pool,
            index: Arc::new(EntryIndex::load(entries)),
            write_gate: Mutex::new(()),
            closed: AtomicBool::new(false),
            upgraded_from,
        })
    }

    async fn prepare(pool: &SqlitePool) -> Result<(i64, Vec<LedgerEntry>)> {
        let mut conn = pool.acquire().await?;
        let upgraded_from = migration::migrate(&mut conn).await?;
        let entries = Self::load_entries(&mut conn).await?;
        Ok((upgraded_from, entries))
    }

    /// All entries in insertion order.
    async fn load_entries(conn: &mut SqliteConnection) -> Result<Vec<LedgerEntry>> {
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
            .order_by_expr(Expr::cust("rowid"), Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(entry_from_row(&row)?);
        }

        Ok(entries)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Schema version found on disk before open-time upgrades ran.
    pub fn upgraded_from(&self) -> i64 {
        self.upgraded_from
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Live view over this connection's entries.
    pub fn entries(&self) -> LiveEntries {
        LiveEntries::new(self.index.clone())
    }

    pub(crate) fn index(&self) -> &EntryIndex {
        &self.index
    }

    /// Pool for point-in-time reads.
    pub(crate) fn reader(&self) -> Result<&SqlitePool> {
        if self.is_closed() {
            return Err(StorageError::StoreClosed);
        }
        Ok(&self.pool)
    }

    /// Take the write gate and start an immediate transaction.
    ///
    /// BEGIN IMMEDIATE acquires the write lock upfront, so a transaction
    /// never fails halfway through on lock upgrade.
    pub(crate) async fn begin(&self) -> Result<WriteTx<'_>> {
        let gate = self.write_gate.lock().await;
        if self.is_closed() {
            return Err(StorageError::StoreClosed);
        }

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        Ok(WriteTx {
            _gate: gate,
            conn: Some(conn),
            finished: false,
        })
    }

    /// Release the connection and invalidate the live index.
    pub(crate) async fn close(&self) {
        let _gate = self.write_gate.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.index.close().await;
        self.pool.close().await;
        info!(path = %self.path, "Ledger store closed");
    }
}

impl WriteTx<'_> {
    /// Connection carrying the open transaction.
    pub(crate) fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn.as_deref_mut().ok_or(StorageError::StoreClosed)
    }

    /// Commit on success, roll back on failure.
    ///
    /// The gate stays held until the `WriteTx` is dropped, so callers
    /// update the live index before letting go of it.
    pub(crate) async fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.finished = true;
        let conn = self.conn()?;

        let result = match result {
            Ok(value) => sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map(|_| value)
                .map_err(StorageError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if !matches!(e, StorageError::EntryNotFound { .. }) {
                    error!(error = %e, "Transaction failed, rolling back");
                }
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }
}

impl Drop for WriteTx<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        warn!("Write transaction abandoned, rolling back");
        match tokio::runtime::Handle::try_current() {
            // The task owns the only pooled connection until ROLLBACK
            // completes, so the next writer cannot see the open transaction.
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        error!(error = %e, "Rollback of abandoned transaction failed");
                        drop(conn.detach());
                    }
                });
            }
            Err(_) => drop(conn.detach()),
        }
    }
}
