use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domains::core::entity::SqlValue;
use crate::utils;

/// Storage/coercion class of one column in a synced table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    /// JSON bool on the wire, INTEGER 0/1 in the table.
    Bool,
    /// RFC 3339 string on the wire, normalized to the fixed-width form
    /// before it hits the TEXT column so ordering stays chronological.
    Timestamp,
    Uuid,
    /// `YYYY-MM-DD` string.
    Date,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
}

impl ColumnSpec {
    const fn new(name: &'static str, kind: ColumnKind, required: bool) -> Self {
        Self { name, kind, required }
    }
}

/// Meta columns every synced table shares, in persisted order.
const META_SPECS: &[ColumnSpec] = &[
    ColumnSpec::new("id", ColumnKind::Uuid, true),
    ColumnSpec::new("created_at", ColumnKind::Timestamp, true),
    ColumnSpec::new("updated_at", ColumnKind::Timestamp, true),
    ColumnSpec::new("is_deleted", ColumnKind::Bool, true),
    ColumnSpec::new("sync_status", ColumnKind::Integer, true),
];

/// Server-side description of one syncable resource: its table plus the
/// full validated column list (meta columns first, then domain columns).
pub struct ServerResource {
    pub resource: &'static str,
    pub table: &'static str,
    columns: Vec<ColumnSpec>,
}

impl ServerResource {
    fn new(resource: &'static str, table: &'static str, domain: &[ColumnSpec]) -> Self {
        let mut columns = META_SPECS.to_vec();
        columns.extend_from_slice(domain);
        Self { resource, table, columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Validate and coerce one incoming record into bindable values, in
    /// column order. A failure returns the reason to echo back to the client.
    pub fn coerce_record(&self, record: &Value) -> Result<Vec<SqlValue>, String> {
        let obj = record
            .as_object()
            .ok_or_else(|| "record is not a JSON object".to_string())?;

        self.columns
            .iter()
            .map(|spec| coerce_field(obj, spec))
            .collect()
    }

    /// Convert one stored row back to its wire shape.
    pub fn row_to_json(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Value, sqlx::Error> {
        use sqlx::Row;

        let mut obj = Map::with_capacity(self.columns.len());
        for spec in &self.columns {
            let value = match spec.kind {
                ColumnKind::Integer => row
                    .try_get::<Option<i64>, _>(spec.name)?
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                ColumnKind::Bool => row
                    .try_get::<Option<i64>, _>(spec.name)?
                    .map(|v| Value::Bool(v != 0))
                    .unwrap_or(Value::Null),
                ColumnKind::Text
                | ColumnKind::Timestamp
                | ColumnKind::Uuid
                | ColumnKind::Date => row
                    .try_get::<Option<String>, _>(spec.name)?
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            };
            obj.insert(spec.name.to_string(), value);
        }
        Ok(Value::Object(obj))
    }
}

fn coerce_field(obj: &Map<String, Value>, spec: &ColumnSpec) -> Result<SqlValue, String> {
    let value = obj.get(spec.name).unwrap_or(&Value::Null);

    if value.is_null() {
        if spec.required {
            return Err(format!("{} is required", spec.name));
        }
        return Ok(SqlValue::Null);
    }

    match spec.kind {
        ColumnKind::Text => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("{} must be a string", spec.name))?;
            if spec.required && s.trim().is_empty() {
                return Err(format!("{} is required", spec.name));
            }
            Ok(SqlValue::Text(s.to_string()))
        }
        ColumnKind::Integer => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| format!("{} must be an integer", spec.name)),
        ColumnKind::Bool => value
            .as_bool()
            .map(|b| SqlValue::Integer(b as i64))
            .ok_or_else(|| format!("{} must be a boolean", spec.name)),
        ColumnKind::Timestamp => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("{} must be a timestamp string", spec.name))?;
            let ts = utils::parse_ts(s, spec.name)
                .map_err(|_| format!("{} is not a valid RFC3339 timestamp", spec.name))?;
            Ok(SqlValue::Text(utils::format_ts(ts)))
        }
        ColumnKind::Uuid => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("{} must be a UUID string", spec.name))?;
            let id = Uuid::parse_str(s).map_err(|_| format!("{} is not a valid UUID", spec.name))?;
            Ok(SqlValue::Text(id.to_string()))
        }
        ColumnKind::Date => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("{} must be a date string", spec.name))?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| format!("{} is not a valid YYYY-MM-DD date", spec.name))?;
            Ok(SqlValue::Text(s.to_string()))
        }
    }
}

/// All resources the sync endpoints accept, keyed by wire name.
pub struct ResourceRegistry {
    resources: Vec<ServerResource>,
}

impl ResourceRegistry {
    pub fn with_defaults() -> Self {
        use ColumnKind::*;

        let teams = ServerResource::new(
            "teams",
            "teams",
            &[
                ColumnSpec::new("name", Text, true),
                ColumnSpec::new("color_hex", Text, true),
                ColumnSpec::new("description", Text, false),
            ],
        );

        let participants = ServerResource::new(
            "participants",
            "participants",
            &[
                ColumnSpec::new("full_name", Text, true),
                ColumnSpec::new("nickname", Text, false),
                ColumnSpec::new("gender", Text, true),
                ColumnSpec::new("birth_date", Date, false),
                ColumnSpec::new("team_id", Uuid, false),
                ColumnSpec::new("status", Text, true),
                ColumnSpec::new("document_number", Text, false),
                ColumnSpec::new("contact_phone", Text, false),
                ColumnSpec::new("guardian_name", Text, false),
                ColumnSpec::new("medical_allergies", Text, false),
                ColumnSpec::new("medical_medications", Text, false),
                ColumnSpec::new("medical_notes", Text, false),
            ],
        );

        let users = ServerResource::new(
            "users",
            "users",
            &[
                ColumnSpec::new("email", Text, true),
                ColumnSpec::new("password_hash", Text, true),
                ColumnSpec::new("full_name", Text, true),
                ColumnSpec::new("role", Text, true),
                ColumnSpec::new("team_id", Uuid, false),
            ],
        );

        Self {
            resources: vec![teams, participants, users],
        }
    }

    pub fn get(&self, resource: &str) -> Option<&ServerResource> {
        self.resources.iter().find(|r| r.resource == resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ServerResource> {
        self.resources.iter()
    }
}
