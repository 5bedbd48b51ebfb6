use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::domains::core::entity::{SyncEntity, SyncState};
use crate::domains::core::store::{upsert_sql, LocalStore};
use crate::errors::{DbError, DomainError, DomainResult};

/// Sync-aware CRUD for one entity kind.
///
/// All sync bookkeeping lives here once; registering a new syncable entity
/// kind means implementing [`SyncEntity`] and instantiating this repository,
/// nothing else.
pub struct SyncRepository<T: SyncEntity> {
    store: Arc<LocalStore>,
    upsert_sql: String,
    select_by_id_sql: String,
    select_all_sql: String,
    select_dirty_sql: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: SyncEntity> SyncRepository<T> {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            upsert_sql: upsert_sql::<T>(),
            select_by_id_sql: format!("SELECT * FROM {} WHERE id = ?", T::TABLE),
            select_all_sql: format!(
                "SELECT * FROM {} WHERE is_deleted = 0 ORDER BY created_at",
                T::TABLE
            ),
            select_dirty_sql: format!(
                "SELECT * FROM {} WHERE sync_status = {} ORDER BY updated_at",
                T::TABLE,
                SyncState::PendingPush.as_i64()
            ),
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Upsert by id. Insert when absent, full-field update when present; the
    /// store's change hook stamps the record dirty either way. Returns the
    /// post-write entity.
    pub async fn save(&self, mut entity: T) -> DomainResult<T> {
        self.store.write(&self.upsert_sql, &mut entity).await?;
        Ok(entity)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<T>> {
        let row = sqlx::query(&self.select_by_id_sql)
            .bind(id.to_string())
            .fetch_optional(self.store.pool())
            .await
            .map_err(DbError::from)?;

        row.as_ref().map(T::from_row).transpose()
    }

    /// All live records; tombstoned rows are filtered out.
    pub async fn find_all(&self) -> DomainResult<Vec<T>> {
        let rows = sqlx::query(&self.select_all_sql)
            .fetch_all(self.store.pool())
            .await
            .map_err(DbError::from)?;

        rows.iter().map(T::from_row).collect()
    }

    /// Flip the tombstone flag via the normal dirty path so the deletion
    /// propagates on the next push. Returns false for an unknown id.
    pub async fn soft_delete(&self, id: Uuid) -> DomainResult<bool> {
        let Some(mut entity) = self.find_by_id(id).await? else {
            return Ok(false);
        };

        entity.meta_mut().is_deleted = true;
        self.save(entity).await?;
        Ok(true)
    }

    /// Records with unacknowledged local changes, tombstoned ones included:
    /// deletions sync exactly like edits.
    pub async fn find_dirty(&self) -> DomainResult<Vec<T>> {
        let rows = sqlx::query(&self.select_dirty_sql)
            .fetch_all(self.store.pool())
            .await
            .map_err(DbError::from)?;

        rows.iter().map(T::from_row).collect()
    }

    /// Bulk-set exactly the given ids to synced. One UPDATE statement that
    /// leaves `updated_at` alone, so acknowledging a push never re-dirties.
    pub async fn mark_synced(&self, ids: &[Uuid]) -> DomainResult<()> {
        self.mark_status(ids, SyncState::Synced).await
    }

    /// Park ids the server rejected as malformed. A later local edit moves
    /// them back to pending through the normal write path.
    pub async fn mark_failed(&self, ids: &[Uuid]) -> DomainResult<()> {
        self.mark_status(ids, SyncState::Failed).await
    }

    async fn mark_status(&self, ids: &[Uuid], state: SyncState) -> DomainResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("UPDATE {} SET sync_status = ", T::TABLE));
        builder.push_bind(state.as_i64());
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        builder.push(")");

        builder
            .build()
            .execute(self.store.pool())
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    /// Authoritative overwrite with server records, written clean and exempt
    /// from the dirty hook. Returns the number of applied records.
    pub async fn upsert_from_remote(&self, records: Vec<T>) -> DomainResult<usize> {
        self.store.apply_remote(&self.upsert_sql, records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::database::connect_in_memory;
    use crate::db_migration::initialize_database;
    use crate::domains::team::types::Team;

    async fn repo() -> SyncRepository<Team> {
        let pool = connect_in_memory().await.unwrap();
        initialize_database(&pool).await.unwrap();
        SyncRepository::new(Arc::new(LocalStore::new(pool)))
    }

    #[tokio::test]
    async fn test_save_marks_dirty_until_acknowledged() {
        let repo = repo().await;

        let team = repo.save(Team::new("Red", "#D32F2F", "")).await.unwrap();
        assert_eq!(team.meta.sync_status, SyncState::PendingPush);
        assert_eq!(repo.find_dirty().await.unwrap().len(), 1);

        repo.mark_synced(&[team.meta.id]).await.unwrap();
        assert!(repo.find_dirty().await.unwrap().is_empty());

        // Any subsequent edit re-dirties through the write hook, even if the
        // caller hands back a stale clean copy.
        let mut stale = repo.find_by_id(team.meta.id).await.unwrap().unwrap();
        stale.name = "Crimson".to_string();
        let saved = repo.save(stale).await.unwrap();
        assert_eq!(saved.meta.sync_status, SyncState::PendingPush);
        assert!(saved.meta.updated_at > team.meta.updated_at);
    }

    #[tokio::test]
    async fn test_mark_synced_touches_exactly_the_given_ids() {
        let repo = repo().await;

        let a = repo.save(Team::new("A", "#111111", "")).await.unwrap();
        let b = repo.save(Team::new("B", "#222222", "")).await.unwrap();
        let c = repo.save(Team::new("C", "#333333", "")).await.unwrap();

        repo.mark_synced(&[a.meta.id, c.meta.id]).await.unwrap();
        repo.mark_synced(&[]).await.unwrap();

        let dirty = repo.find_dirty().await.unwrap();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].meta.id, b.meta.id);

        // Acknowledgement must not shift updated_at, or the next pull would
        // echo the record straight back.
        let acked = repo.find_by_id(a.meta.id).await.unwrap().unwrap();
        assert_eq!(
            acked.meta.updated_at.timestamp_micros(),
            a.meta.updated_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_mark_failed_parks_until_next_edit() {
        let repo = repo().await;
        let team = repo.save(Team::new("Red", "#D32F2F", "")).await.unwrap();

        repo.mark_failed(&[team.meta.id]).await.unwrap();
        assert!(repo.find_dirty().await.unwrap().is_empty());
        let parked = repo.find_by_id(team.meta.id).await.unwrap().unwrap();
        assert_eq!(parked.meta.sync_status, SyncState::Failed);

        repo.save(parked).await.unwrap();
        assert_eq!(repo.find_dirty().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_from_remote_is_idempotent_and_clean() {
        let repo = repo().await;

        let mut record = Team::new("Red", "#D32F2F", "");
        record.meta.sync_status = SyncState::PendingPush;

        repo.upsert_from_remote(vec![record.clone()]).await.unwrap();
        repo.upsert_from_remote(vec![record.clone()]).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].meta.sync_status, SyncState::Synced);
        // Timestamps are taken verbatim, not restamped.
        assert_eq!(
            all[0].meta.updated_at.timestamp_micros(),
            record.meta.updated_at.timestamp_micros()
        );
        assert!(repo.find_dirty().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_the_row() {
        let repo = repo().await;
        let team = repo.save(Team::new("Red", "#D32F2F", "")).await.unwrap();
        repo.mark_synced(&[team.meta.id]).await.unwrap();

        assert!(repo.soft_delete(team.meta.id).await.unwrap());
        assert!(!repo.soft_delete(Uuid::new_v4()).await.unwrap());

        assert!(repo.find_all().await.unwrap().is_empty());
        let row = repo.find_by_id(team.meta.id).await.unwrap().unwrap();
        assert!(row.meta.is_deleted);

        // The tombstone is dirty and travels with the next push.
        let dirty = repo.find_dirty().await.unwrap();
        assert_eq!(dirty.len(), 1);
        assert!(dirty[0].meta.is_deleted);
    }
}
