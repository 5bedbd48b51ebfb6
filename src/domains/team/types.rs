use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domains::core::entity::{SqlValue, SyncEntity, SyncMeta};
use crate::errors::{DbError, DomainResult};

/// A grouping of participants. Teams sync before the entities that reference
/// them by id, so the server never sees a dangling `team_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub name: String,
    pub color_hex: String,
    pub description: String,
}

impl Team {
    pub fn new(name: &str, color_hex: &str, description: &str) -> Self {
        Self {
            meta: SyncMeta::new(),
            name: name.to_string(),
            color_hex: color_hex.to_string(),
            description: description.to_string(),
        }
    }
}

impl SyncEntity for Team {
    const TABLE: &'static str = "teams";
    const RESOURCE: &'static str = "teams";

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn data_columns() -> &'static [&'static str] {
        &["name", "color_hex", "description"]
    }

    fn data_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.name.clone()),
            SqlValue::Text(self.color_hex.clone()),
            SqlValue::Text(self.description.clone()),
        ]
    }

    fn from_row(row: &SqliteRow) -> DomainResult<Self> {
        Ok(Self {
            meta: SyncMeta::from_row(row)?,
            name: row.try_get("name").map_err(DbError::from)?,
            color_hex: row.try_get("color_hex").map_err(DbError::from)?,
            description: row.try_get("description").map_err(DbError::from)?,
        })
    }
}
