use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domains::core::entity::{SqlValue, SyncEntity, SyncMeta};
use crate::errors::{DbError, DomainError, DomainResult, ValidationError};

/// Intake pipeline status of a participant. Stored as plain TEXT so the
/// column stays portable across storage technologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Registered,
    UnderReview,
    Approved,
    Waitlisted,
    TeamAssigned,
    CheckedIn,
    Active,
    Closed,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Registered => "registered",
            ParticipantStatus::UnderReview => "under_review",
            ParticipantStatus::Approved => "approved",
            ParticipantStatus::Waitlisted => "waitlisted",
            ParticipantStatus::TeamAssigned => "team_assigned",
            ParticipantStatus::CheckedIn => "checked_in",
            ParticipantStatus::Active => "active",
            ParticipantStatus::Closed => "closed",
        }
    }
}

impl FromStr for ParticipantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(ParticipantStatus::Registered),
            "under_review" => Ok(ParticipantStatus::UnderReview),
            "approved" => Ok(ParticipantStatus::Approved),
            "waitlisted" => Ok(ParticipantStatus::Waitlisted),
            "team_assigned" => Ok(ParticipantStatus::TeamAssigned),
            "checked_in" => Ok(ParticipantStatus::CheckedIn),
            "active" => Ok(ParticipantStatus::Active),
            "closed" => Ok(ParticipantStatus::Closed),
            _ => Err(DomainError::Validation(ValidationError::invalid_value(
                "status",
                &format!("unknown participant status: {}", s),
            ))),
        }
    }
}

/// A field-registered participant record, the main entity edited offline.
/// Medical fields are sensitive; whether the UI exposes them is decided by
/// the caller's capability check, never by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    #[serde(flatten)]
    pub meta: SyncMeta,
    pub full_name: String,
    pub nickname: Option<String>,
    pub gender: String,
    pub birth_date: Option<NaiveDate>,
    pub team_id: Option<Uuid>,
    pub status: ParticipantStatus,
    pub document_number: Option<String>,
    pub contact_phone: Option<String>,
    pub guardian_name: Option<String>,
    pub medical_allergies: Option<String>,
    pub medical_medications: Option<String>,
    pub medical_notes: Option<String>,
}

impl Participant {
    pub fn new(full_name: &str, gender: &str) -> Self {
        Self {
            meta: SyncMeta::new(),
            full_name: full_name.to_string(),
            nickname: None,
            gender: gender.to_string(),
            birth_date: None,
            team_id: None,
            status: ParticipantStatus::Registered,
            document_number: None,
            contact_phone: None,
            guardian_name: None,
            medical_allergies: None,
            medical_medications: None,
            medical_notes: None,
        }
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_opt_date(raw: Option<String>) -> DomainResult<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "birth_date",
                &format!("Invalid date: {}", s),
            ))
        })
    })
    .transpose()
}

fn parse_opt_uuid(raw: Option<String>, field: &str) -> DomainResult<Option<Uuid>> {
    raw.map(|s| {
        Uuid::parse_str(&s).map_err(|_| {
            DomainError::Validation(ValidationError::format(
                field,
                &format!("Invalid UUID: {}", s),
            ))
        })
    })
    .transpose()
}

impl SyncEntity for Participant {
    const TABLE: &'static str = "participants";
    const RESOURCE: &'static str = "participants";

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn data_columns() -> &'static [&'static str] {
        &[
            "full_name",
            "nickname",
            "gender",
            "birth_date",
            "team_id",
            "status",
            "document_number",
            "contact_phone",
            "guardian_name",
            "medical_allergies",
            "medical_medications",
            "medical_notes",
        ]
    }

    fn data_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.full_name.clone()),
            SqlValue::opt_text(self.nickname.clone()),
            SqlValue::Text(self.gender.clone()),
            SqlValue::opt_text(self.birth_date.map(|d| d.format(DATE_FORMAT).to_string())),
            SqlValue::opt_text(self.team_id.map(|id| id.to_string())),
            SqlValue::Text(self.status.as_str().to_string()),
            SqlValue::opt_text(self.document_number.clone()),
            SqlValue::opt_text(self.contact_phone.clone()),
            SqlValue::opt_text(self.guardian_name.clone()),
            SqlValue::opt_text(self.medical_allergies.clone()),
            SqlValue::opt_text(self.medical_medications.clone()),
            SqlValue::opt_text(self.medical_notes.clone()),
        ]
    }

    fn from_row(row: &SqliteRow) -> DomainResult<Self> {
        let status_raw: String = row.try_get("status").map_err(DbError::from)?;
        let birth_raw: Option<String> = row.try_get("birth_date").map_err(DbError::from)?;
        let team_raw: Option<String> = row.try_get("team_id").map_err(DbError::from)?;

        Ok(Self {
            meta: SyncMeta::from_row(row)?,
            full_name: row.try_get("full_name").map_err(DbError::from)?,
            nickname: row.try_get("nickname").map_err(DbError::from)?,
            gender: row.try_get("gender").map_err(DbError::from)?,
            birth_date: parse_opt_date(birth_raw)?,
            team_id: parse_opt_uuid(team_raw, "team_id")?,
            status: status_raw.parse()?,
            document_number: row.try_get("document_number").map_err(DbError::from)?,
            contact_phone: row.try_get("contact_phone").map_err(DbError::from)?,
            guardian_name: row.try_get("guardian_name").map_err(DbError::from)?,
            medical_allergies: row.try_get("medical_allergies").map_err(DbError::from)?,
            medical_medications: row.try_get("medical_medications").map_err(DbError::from)?,
            medical_notes: row.try_get("medical_notes").map_err(DbError::from)?,
        })
    }
}
