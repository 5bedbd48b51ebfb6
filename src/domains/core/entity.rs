use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{query::Query, Row, Sqlite};
use uuid::Uuid;

use crate::errors::{DbError, DomainError, DomainResult, ValidationError};
use crate::utils;

/// Synchronization state of a locally stored record.
///
/// Persisted as INTEGER and carried on the wire as the same integer:
/// 0 = synced, 1 = pending push, 2 = failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    PendingPush,
    Failed,
}

impl SyncState {
    pub fn as_i64(self) -> i64 {
        match self {
            SyncState::Synced => 0,
            SyncState::PendingPush => 1,
            SyncState::Failed => 2,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(SyncState::Synced),
            1 => Some(SyncState::PendingPush),
            2 => Some(SyncState::Failed),
            _ => None,
        }
    }
}

impl Serialize for SyncState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for SyncState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        SyncState::from_i64(value).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid sync_status value: {}", value))
        })
    }
}

/// The shared shape every syncable record embeds: client-generated identity,
/// audit timestamps, soft-delete tombstone and sync state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMeta {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_status: SyncState,
}

impl SyncMeta {
    /// New record identity: a random v4 UUID so disconnected clients can
    /// create records concurrently without key collisions. Starts dirty.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_status: SyncState::PendingPush,
        }
    }

    pub fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.id.to_string()),
            SqlValue::Text(utils::format_ts(self.created_at)),
            SqlValue::Text(utils::format_ts(self.updated_at)),
            SqlValue::Integer(self.is_deleted as i64),
            SqlValue::Integer(self.sync_status.as_i64()),
        ]
    }

    pub fn from_row(row: &SqliteRow) -> DomainResult<Self> {
        let id_raw: String = row.try_get("id").map_err(DbError::from)?;
        let id = Uuid::parse_str(&id_raw).map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "id",
                &format!("Invalid UUID: {}", id_raw),
            ))
        })?;

        let created_raw: String = row.try_get("created_at").map_err(DbError::from)?;
        let updated_raw: String = row.try_get("updated_at").map_err(DbError::from)?;
        let is_deleted: i64 = row.try_get("is_deleted").map_err(DbError::from)?;
        let status_raw: i64 = row.try_get("sync_status").map_err(DbError::from)?;

        Ok(Self {
            id,
            created_at: utils::parse_ts(&created_raw, "created_at")?,
            updated_at: utils::parse_ts(&updated_raw, "updated_at")?,
            is_deleted: is_deleted != 0,
            sync_status: SyncState::from_i64(status_raw).ok_or_else(|| {
                DomainError::Validation(ValidationError::invalid_value(
                    "sync_status",
                    &format!("unknown value {}", status_raw),
                ))
            })?,
        })
    }
}

impl Default for SyncMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Columns shared by every syncable table, in persisted order.
pub const META_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "is_deleted", "sync_status"];

/// A plain portable SQL value, so generic statements can bind entity fields
/// without knowing the concrete entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl SqlValue {
    pub fn opt_text(value: Option<String>) -> Self {
        match value {
            Some(v) => SqlValue::Text(v),
            None => SqlValue::Null,
        }
    }
}

/// Bind a [`SqlValue`] onto a query, preserving NULLs.
pub fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Null => query.bind(None::<String>),
    }
}

/// The explicit per-entity-kind mapping between the struct, its table and its
/// wire representation. Implementations list their domain columns once;
/// `data_values` must yield values in exactly the `data_columns` order.
///
/// Serde supplies the wire mapping: unknown payload fields are ignored on
/// deserialization, and the `id` column is never part of an UPDATE set.
pub trait SyncEntity:
    Clone + Send + Sync + Unpin + Serialize + DeserializeOwned + 'static
{
    /// Local/remote table name.
    const TABLE: &'static str;

    /// Stable resource name used on the wire (`/sync/push/{resource}`).
    const RESOURCE: &'static str;

    fn meta(&self) -> &SyncMeta;

    fn meta_mut(&mut self) -> &mut SyncMeta;

    /// Domain columns beyond the shared meta columns.
    fn data_columns() -> &'static [&'static str];

    /// Domain values, one per entry of `data_columns`, in the same order.
    fn data_values(&self) -> Vec<SqlValue>;

    fn from_row(row: &SqliteRow) -> DomainResult<Self>;

    fn id(&self) -> Uuid {
        self.meta().id
    }
}
