use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domains::core::entity::{SqlValue, SyncState, bind_value};
use crate::domains::sync::types::{PullResponse, PushResponse, RejectedRecord};
use crate::errors::{DbError, DomainError, DomainResult, SyncError};
use crate::server::registry::{ResourceRegistry, ServerResource};
use crate::utils;

/// Column offsets within the registry order (meta columns come first).
const COL_ID: usize = 0;
const COL_UPDATED_AT: usize = 2;
const COL_SYNC_STATUS: usize = 4;

/// The authoritative side of the push/pull protocol. One instance serves
/// every registered resource against a single database.
pub struct RemoteSyncService {
    pool: SqlitePool,
    registry: ResourceRegistry,
}

impl RemoteSyncService {
    pub fn new(pool: SqlitePool, registry: ResourceRegistry) -> Self {
        Self { pool, registry }
    }

    fn resource(&self, name: &str) -> DomainResult<&ServerResource> {
        self.registry
            .get(name)
            .ok_or_else(|| DomainError::Sync(SyncError::UnknownResource(name.to_string())))
    }

    /// Process one push batch. Each record is judged independently:
    /// malformed records are rejected with a reason, records older than the
    /// stored copy are reported as conflicts and left untouched, everything
    /// else is upserted with last write winning on `updated_at`.
    pub async fn push(&self, resource: &str, records: &[Value]) -> DomainResult<PushResponse> {
        let spec = self.resource(resource)?;
        let upsert = build_upsert_sql(spec);

        let mut processed_ids = Vec::new();
        let mut conflict_ids = Vec::new();
        let mut rejected = Vec::new();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        for record in records {
            let mut values = match spec.coerce_record(record) {
                Ok(values) => values,
                Err(reason) => {
                    rejected.push(RejectedRecord {
                        id: extract_id(record),
                        reason,
                    });
                    continue;
                }
            };

            let (id, incoming_updated) = match (&values[COL_ID], &values[COL_UPDATED_AT]) {
                (SqlValue::Text(id), SqlValue::Text(ts)) => (id.clone(), ts.clone()),
                _ => {
                    rejected.push(RejectedRecord {
                        id: extract_id(record),
                        reason: "id and updated_at are required".to_string(),
                    });
                    continue;
                }
            };

            let stored_updated: Option<String> =
                sqlx::query_scalar(&format!(
                    "SELECT updated_at FROM {} WHERE id = ?",
                    spec.table
                ))
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(DbError::from)?;

            // Fixed-width timestamps, so string comparison is chronological.
            // Equal timestamps are accepted: a re-push after a lost
            // acknowledgement must converge, not conflict.
            if let Some(stored) = stored_updated {
                if stored > incoming_updated {
                    if let Ok(parsed) = Uuid::parse_str(&id) {
                        conflict_ids.push(parsed);
                    }
                    continue;
                }
            }

            // The stored copy is authoritative once accepted.
            values[COL_SYNC_STATUS] = SqlValue::Integer(SyncState::Synced.as_i64());

            let mut query = sqlx::query(&upsert);
            for value in values {
                query = bind_value(query, value);
            }
            query.execute(&mut *tx).await.map_err(DbError::from)?;

            if let Ok(parsed) = Uuid::parse_str(&id) {
                processed_ids.push(parsed);
            }
        }

        tx.commit().await.map_err(DbError::from)?;

        let status = if conflict_ids.is_empty() && rejected.is_empty() {
            "success"
        } else {
            "partial"
        };
        log::info!(
            "push {}: {} accepted, {} conflicts, {} rejected",
            resource,
            processed_ids.len(),
            conflict_ids.len(),
            rejected.len()
        );

        Ok(PushResponse {
            processed_ids,
            status: status.to_string(),
            conflict_ids,
            rejected,
        })
    }

    /// Return every record of `resource` changed strictly after `since`,
    /// tombstones included, oldest first.
    ///
    /// `current_server_time` is the caller's next checkpoint. It is clamped
    /// to at least the newest stored `updated_at` so no record can postdate
    /// it, even if a client clock ran ahead of the server's.
    pub async fn pull(&self, resource: &str, since: DateTime<Utc>) -> DomainResult<PullResponse> {
        let spec = self.resource(resource)?;

        // Both reads share one transaction so a push committing between them
        // cannot land under the returned server time without appearing in
        // the change set.
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM {} WHERE updated_at > ? ORDER BY updated_at ASC",
            spec.table
        ))
        .bind(utils::format_ts(since))
        .fetch_all(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let mut changes = Vec::with_capacity(rows.len());
        for row in &rows {
            changes.push(spec.row_to_json(row).map_err(DbError::from)?);
        }

        let newest: Option<String> =
            sqlx::query_scalar(&format!("SELECT MAX(updated_at) FROM {}", spec.table))
                .fetch_one(&mut *tx)
                .await
                .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        let mut current_server_time = Utc::now();
        if let Some(raw) = newest {
            let newest_ts = utils::parse_ts(&raw, "updated_at")?;
            if newest_ts > current_server_time {
                current_server_time = newest_ts;
            }
        }

        log::debug!("pull {}: {} changes since {}", resource, changes.len(), since);

        Ok(PullResponse {
            resource: resource.to_string(),
            changes,
            current_server_time,
        })
    }
}

fn extract_id(record: &Value) -> Option<Uuid> {
    record
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn build_upsert_sql(spec: &ServerResource) -> String {
    let columns: Vec<String> = spec
        .columns()
        .iter()
        .map(|c| utils::sanitize_identifier(c.name))
        .collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != "id")
        .map(|c| format!("{} = excluded.{}", c, c))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        utils::sanitize_identifier(spec.table),
        columns.join(", "),
        placeholders,
        updates.join(", ")
    )
}
