use chrono::{DateTime, SecondsFormat, Utc};

use crate::errors::{DomainError, ValidationError};

/// Format a timestamp in the fixed-width encoding used for every persisted
/// `created_at`/`updated_at` value (RFC 3339, microsecond precision, `Z` suffix).
///
/// Fixed width keeps lexicographic ordering of the stored TEXT columns identical
/// to chronological ordering, which the delta queries rely on.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp in any RFC 3339 form back to UTC.
pub fn parse_ts(raw: &str, field_name: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            DomainError::Validation(ValidationError::format(
                field_name,
                &format!("Invalid RFC3339 timestamp: {}", raw),
            ))
        })
}

/// Sanitize a SQL identifier for use in dynamically assembled statements.
/// Only alphanumerics and underscores survive; anything else is dropped.
pub fn sanitize_identifier(identifier: &str) -> String {
    let safe_id: String = identifier
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    if safe_id.is_empty() {
        return "_invalid".to_string();
    }

    if safe_id.chars().all(|c| c.is_numeric()) {
        return format!("_{}", safe_id);
    }

    safe_id
}
