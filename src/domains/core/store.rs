use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

use crate::domains::core::entity::{bind_value, SyncEntity, SyncState, META_COLUMNS};
use crate::errors::{DbError, DomainError, DomainResult};

/// Durable local store for all syncable tables.
///
/// Every committed local write funnels through [`LocalStore::write`], the single
/// chokepoint that marks the record dirty. No calling convention can bypass it;
/// the one exempt path is [`LocalStore::apply_remote`], used only for records
/// arriving from the server, which would otherwise ping-pong back on the next
/// push.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert-or-replace a locally mutated entity.
    ///
    /// The change hook runs here: `updated_at` is forced to now and
    /// `sync_status` to pending regardless of what the caller supplied, so a
    /// stale in-memory copy cannot write back an old timestamp or a clean flag.
    pub async fn write<T: SyncEntity>(&self, upsert_sql: &str, entity: &mut T) -> DomainResult<()> {
        let meta = entity.meta_mut();
        meta.updated_at = Utc::now();
        meta.sync_status = SyncState::PendingPush;

        exec_upsert(upsert_sql, entity, &self.pool).await
    }

    /// Apply a batch of authoritative server records, field-for-field including
    /// timestamps, forced clean. Runs in one transaction: a constraint failure
    /// on any record leaves the whole batch unapplied.
    pub async fn apply_remote<T: SyncEntity>(
        &self,
        upsert_sql: &str,
        mut records: Vec<T>,
    ) -> DomainResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::Database(DbError::Transaction(e.to_string())))?;

        for record in &mut records {
            record.meta_mut().sync_status = SyncState::Synced;
            exec_upsert(upsert_sql, record, &mut *tx).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::Database(DbError::Transaction(e.to_string())))?;

        Ok(records.len())
    }
}

/// Build the upsert statement for an entity kind. Assembled once per kind at
/// repository construction; `id` is excluded from the UPDATE set so a payload
/// can never rewrite a record's identity.
pub fn upsert_sql<T: SyncEntity>() -> String {
    let mut columns: Vec<&str> = META_COLUMNS.to_vec();
    columns.extend_from_slice(T::data_columns());

    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates = columns
        .iter()
        .filter(|c| **c != "id")
        .map(|c| format!("{0} = excluded.{0}", c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        T::TABLE,
        columns.join(", "),
        placeholders,
        updates
    )
}

async fn exec_upsert<'e, T, E>(sql: &str, entity: &T, executor: E) -> DomainResult<()>
where
    T: SyncEntity,
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let mut query = sqlx::query(sql);
    for value in entity.meta().values() {
        query = bind_value(query, value);
    }
    for value in entity.data_values() {
        query = bind_value(query, value);
    }

    query
        .execute(executor)
        .await
        .map_err(|e| DomainError::Database(DbError::from(e)))?;

    Ok(())
}
