//! Offline-first delta synchronization for field registration data.
//!
//! Records are edited locally against SQLite with no connectivity assumed;
//! a push-then-pull sync cycle reconciles devices through a small HTTP
//! protocol with last-write-wins conflict resolution.

pub mod auth;
pub mod database;
pub mod db_migration;
pub mod domains;
pub mod errors;
pub mod server;
pub mod utils;

use sqlx::SqlitePool;

use crate::errors::DomainResult;

/// Open (creating if needed) the database at `db_path` and bring its schema
/// up to date. The returned pool is the one handle the rest of the app uses.
pub async fn initialize(db_path: &str) -> DomainResult<SqlitePool> {
    let pool = database::connect(db_path).await?;
    db_migration::initialize_database(&pool).await?;
    Ok(pool)
}
