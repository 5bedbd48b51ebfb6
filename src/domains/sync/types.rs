use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phases of a single sync run: `Pushing` then `Pulling`, ending in `Done`.
/// Early termination is carried by the run's [`RunStatus`], not a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Pushing,
    Pulling,
    Done,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Pushing => "pushing",
            SyncPhase::Pulling => "pulling",
            SyncPhase::Done => "done",
        }
    }
}

/// Terminal status of a sync run, reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Offline,
    Error,
    /// A run was already in flight; this trigger was ignored.
    AlreadyRunning,
}

/// End-of-run summary: counts, per-id conflict/rejection detail and a single
/// overall status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub pushed: usize,
    pub pulled: usize,
    /// Ids the server holds a newer copy of; they stay pending locally.
    pub conflicts: Vec<Uuid>,
    /// Per-record validation rejections, formatted `resource/id: reason`.
    pub rejected: Vec<String>,
    pub errors: Vec<String>,
    pub status: RunStatus,
}

impl SyncReport {
    pub fn new() -> Self {
        Self {
            pushed: 0,
            pulled: 0,
            conflicts: Vec::new(),
            rejected: Vec::new(),
            errors: Vec::new(),
            status: RunStatus::Success,
        }
    }

    pub fn already_running() -> Self {
        Self {
            status: RunStatus::AlreadyRunning,
            ..Self::new()
        }
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new()
    }
}

/// A push record the server refused to process, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Absent when the record was too malformed to extract an id.
    pub id: Option<Uuid>,
    pub reason: String,
}

/// Response body of `POST /sync/push/{resource}`.
///
/// `processed_ids` is the authoritative acknowledgement: only those ids may be
/// marked synced locally. `conflict_ids` and `rejected` are supplementary
/// detail and default to empty for older servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub processed_ids: Vec<Uuid>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

/// Response body of `GET /sync/pull/{resource}?since=...`.
///
/// `current_server_time` is the next checkpoint value; the server guarantees
/// no record of this resource is newer than it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    pub resource: String,
    pub changes: Vec<serde_json::Value>,
    pub current_server_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_response_tolerates_minimal_body() {
        // The wire contract only fixes processed_ids and status.
        let resp: PushResponse =
            serde_json::from_str(r#"{"processed_ids": [], "status": "success"}"#).unwrap();
        assert!(resp.conflict_ids.is_empty());
        assert!(resp.rejected.is_empty());
    }

    #[test]
    fn test_pull_response_round_trip() {
        let resp = PullResponse {
            resource: "teams".into(),
            changes: vec![serde_json::json!({"id": "x"})],
            current_server_time: Utc::now(),
        };
        let raw = serde_json::to_string(&resp).unwrap();
        let back: PullResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.resource, "teams");
        assert_eq!(back.changes.len(), 1);
    }
}
