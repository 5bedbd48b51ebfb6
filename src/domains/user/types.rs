use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domains::core::entity::{SqlValue, SyncEntity, SyncMeta};
use crate::errors::{DbError, DomainError, DomainResult, ValidationError};

/// Role hierarchy for field staff. Drives the two capability checks the
/// surrounding UI consumes; the sync engine itself ignores roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access, including role management.
    Admin,
    /// Leads one team; edits records within scope.
    TeamLead,
    /// Restricted to their own assignment; read-mostly.
    Staff,
    /// May read and write sensitive medical fields.
    Medic,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::TeamLead => "team_lead",
            UserRole::Staff => "staff",
            UserRole::Medic => "medic",
        }
    }

    pub fn can_edit_records(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::TeamLead | UserRole::Medic)
    }

    pub fn can_write_sensitive_fields(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Medic)
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "team_lead" => Ok(UserRole::TeamLead),
            "staff" => Ok(UserRole::Staff),
            "medic" => Ok(UserRole::Medic),
            _ => Err(DomainError::Validation(ValidationError::invalid_value(
                "role",
                &format!("unknown user role: {}", s),
            ))),
        }
    }
}

/// A local account. Credentials are verified against the local store so
/// login keeps working with no connectivity; accounts themselves sync like
/// any other record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: UserRole,
    pub team_id: Option<Uuid>,
}

impl User {
    pub fn new(email: &str, password_hash: &str, full_name: &str, role: UserRole) -> Self {
        Self {
            meta: SyncMeta::new(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            full_name: full_name.to_string(),
            role,
            team_id: None,
        }
    }
}

impl SyncEntity for User {
    const TABLE: &'static str = "users";
    const RESOURCE: &'static str = "users";

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn data_columns() -> &'static [&'static str] {
        &["email", "password_hash", "full_name", "role", "team_id"]
    }

    fn data_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.email.clone()),
            SqlValue::Text(self.password_hash.clone()),
            SqlValue::Text(self.full_name.clone()),
            SqlValue::Text(self.role.as_str().to_string()),
            SqlValue::opt_text(self.team_id.map(|id| id.to_string())),
        ]
    }

    fn from_row(row: &SqliteRow) -> DomainResult<Self> {
        let role_raw: String = row.try_get("role").map_err(DbError::from)?;
        let team_raw: Option<String> = row.try_get("team_id").map_err(DbError::from)?;

        Ok(Self {
            meta: SyncMeta::from_row(row)?,
            email: row.try_get("email").map_err(DbError::from)?,
            password_hash: row.try_get("password_hash").map_err(DbError::from)?,
            full_name: row.try_get("full_name").map_err(DbError::from)?,
            role: role_raw.parse()?,
            team_id: team_raw
                .map(|s| {
                    Uuid::parse_str(&s).map_err(|_| {
                        DomainError::Validation(ValidationError::format(
                            "team_id",
                            &format!("Invalid UUID: {}", s),
                        ))
                    })
                })
                .transpose()?,
        })
    }
}
