use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{DomainError, SyncError};
use crate::server::service::RemoteSyncService;
use crate::utils;

pub fn router(service: Arc<RemoteSyncService>) -> Router {
    Router::new()
        .route("/", get(root_status))
        .route("/sync/push/:resource", post(push_resource))
        .route("/sync/pull/:resource", get(pull_resource))
        .with_state(service)
}

async fn root_status() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    }))
}

#[derive(Debug, Deserialize)]
struct PullParams {
    /// RFC 3339 checkpoint; absent means "everything".
    since: Option<String>,
}

async fn push_resource(
    State(service): State<Arc<RemoteSyncService>>,
    Path(resource): Path<String>,
    Json(records): Json<Vec<Value>>,
) -> Result<Json<Value>, ApiError> {
    let response = service.push(&resource, &records).await?;
    Ok(Json(serde_json::to_value(response).map_err(|e| {
        ApiError::from(DomainError::Internal(e.to_string()))
    })?))
}

async fn pull_resource(
    State(service): State<Arc<RemoteSyncService>>,
    Path(resource): Path<String>,
    Query(params): Query<PullParams>,
) -> Result<Json<Value>, ApiError> {
    let since = match params.since.as_deref() {
        Some(raw) => utils::parse_ts(raw, "since")?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };

    let response = service.pull(&resource, since).await?;
    Ok(Json(serde_json::to_value(response).map_err(|e| {
        ApiError::from(DomainError::Internal(e.to_string()))
    })?))
}

/// Maps domain failures onto wire status codes: unknown resource is 404,
/// bad input is 400, everything else is a 500 without internal detail.
struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            DomainError::Sync(SyncError::UnknownResource(name)) => (
                StatusCode::NOT_FOUND,
                format!("unknown resource: {}", name),
            ),
            DomainError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            other => {
                log::error!("request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
