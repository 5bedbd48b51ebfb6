use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::{DbError, DomainResult};
use crate::utils;

/// Persisted pull checkpoints, one `sys_meta` row per resource kind.
///
/// A shared checkpoint under-syncs whichever resource pulls first, so each
/// resource tracks its own boundary. A missing row means "never synced" and
/// defaults to the epoch, which makes a first pull fetch everything.
#[derive(Clone)]
pub struct CheckpointStore {
    pool: SqlitePool,
}

const KEY_PREFIX: &str = "last_sync_";

impl CheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, resource: &str) -> DomainResult<DateTime<Utc>> {
        let row = sqlx::query("SELECT value FROM sys_meta WHERE key = ?")
            .bind(format!("{}{}", KEY_PREFIX, resource))
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("value").map_err(DbError::from)?;
                Ok(utils::parse_ts(&raw, "checkpoint")?)
            }
            None => Ok(DateTime::UNIX_EPOCH),
        }
    }

    /// Move the checkpoint forward to `ts`. Never moves backwards, so a
    /// replayed or out-of-order response cannot widen future pulls.
    pub async fn advance(&self, resource: &str, ts: DateTime<Utc>) -> DomainResult<()> {
        let current = self.get(resource).await?;
        if ts <= current {
            return Ok(());
        }

        sqlx::query("INSERT OR REPLACE INTO sys_meta (key, value) VALUES (?, ?)")
            .bind(format!("{}{}", KEY_PREFIX, resource))
            .bind(utils::format_ts(ts))
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_store() -> CheckpointStore {
        let pool = crate::database::connect_in_memory().await.unwrap();
        crate::db_migration::initialize_database(&pool).await.unwrap();
        CheckpointStore::new(pool)
    }

    #[tokio::test]
    async fn test_missing_checkpoint_defaults_to_epoch() {
        let store = test_store().await;
        assert_eq!(store.get("teams").await.unwrap(), DateTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_checkpoints_are_per_resource() {
        let store = test_store().await;
        let now = Utc::now();

        store.advance("teams", now).await.unwrap();
        assert_eq!(store.get("participants").await.unwrap(), DateTime::UNIX_EPOCH);

        let stored = store.get("teams").await.unwrap();
        assert_eq!(stored.timestamp_micros(), now.timestamp_micros());
    }

    #[tokio::test]
    async fn test_advance_is_monotonic() {
        let store = test_store().await;
        let now = Utc::now();

        store.advance("teams", now).await.unwrap();
        store.advance("teams", now - Duration::hours(1)).await.unwrap();

        let stored = store.get("teams").await.unwrap();
        assert_eq!(stored.timestamp_micros(), now.timestamp_micros());
    }
}
