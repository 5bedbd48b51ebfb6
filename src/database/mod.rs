use std::str::FromStr;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::errors::{DbError, DomainResult};

/// Open (or create) a database file tuned for concurrent UI reads alongside
/// background sync writes: WAL journal so readers never block on a writer,
/// NORMAL synchronous, foreign keys enforced.
pub async fn connect(db_path: &str) -> DomainResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))
        .map_err(DbError::from)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(DbError::from)?;

    Ok(pool)
}

/// In-memory database on a single connection, used by tests and ephemeral
/// server setups. One connection keeps every handle on the same database.
pub async fn connect_in_memory() -> DomainResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(DbError::from)?;

    Ok(pool)
}
