//! Versioned schema upgrade applied on open.
//!
//! The version tag lives in `PRAGMA user_version`. Only one upgrade path
//! exists: files written before version 3 lack the `sort_order` column,
//! which is added with default 0 for every existing entry.

use sqlx::SqliteConnection;
use tracing::{error, info};

use super::schema::{
    ADD_SORT_ORDER_COLUMN, CREATE_ENTRIES_TABLE, CREATE_HISTORY_INDEX, CREATE_HISTORY_TABLE,
    SCHEMA_VERSION,
};
use super::{Result, StorageError};

/// Bring the database to `SCHEMA_VERSION`.
///
/// Returns the version found on disk before any upgrade ran.
pub async fn migrate(conn: &mut SqliteConnection) -> Result<i64> {
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    match apply(conn).await {
        Ok(found) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(found)
        }
        Err(e) => {
            error!(error = %e, "Schema migration failed, rolling back");
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(e)
        }
    }
}

async fn apply(conn: &mut SqliteConnection) -> Result<i64> {
    let found = user_version(conn).await?;

    match found {
        SCHEMA_VERSION => create_tables(conn).await?,
        0 => {
            if table_exists(conn, "entries").await? {
                // Tables without a version tag have no defined upgrade path.
                return Err(StorageError::UnsupportedSchemaVersion {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
            create_tables(conn).await?;
            set_user_version(conn, SCHEMA_VERSION).await?;
            info!(version = SCHEMA_VERSION, "Created ledger schema");
        }
        v if (1..SCHEMA_VERSION).contains(&v) => {
            upgrade_to_current(conn).await?;
            info!(from = v, to = SCHEMA_VERSION, "Upgraded ledger schema");
        }
        _ => {
            return Err(StorageError::UnsupportedSchemaVersion {
                found,
                supported: SCHEMA_VERSION,
            });
        }
    }

    Ok(found)
}

async fn upgrade_to_current(conn: &mut SqliteConnection) -> Result<()> {
    if table_exists(conn, "entries").await? {
        if !column_exists(conn, "entries", "sort_order").await? {
            sqlx::query(ADD_SORT_ORDER_COLUMN).execute(&mut *conn).await?;
        }
    } else {
        sqlx::query(CREATE_ENTRIES_TABLE).execute(&mut *conn).await?;
    }

    sqlx::query(CREATE_HISTORY_TABLE).execute(&mut *conn).await?;
    sqlx::query(CREATE_HISTORY_INDEX).execute(&mut *conn).await?;
    set_user_version(conn, SCHEMA_VERSION).await
}

async fn create_tables(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(CREATE_ENTRIES_TABLE).execute(&mut *conn).await?;
    sqlx::query(CREATE_HISTORY_TABLE).execute(&mut *conn).await?;
    sqlx::query(CREATE_HISTORY_INDEX).execute(&mut *conn).await?;
    Ok(())
}

/// Read the schema version tag.
pub async fn user_version(conn: &mut SqliteConnection) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await?;
    Ok(version)
}

async fn set_user_version(conn: &mut SqliteConnection, version: i64) -> Result<()> {
    // PRAGMA arguments cannot be bound.
    sqlx::query(&format!("PRAGMA user_version = {}", version))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

async fn column_exists(conn: &mut SqliteConnection, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}
