use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domains::sync::types::{PullResponse, PushResponse};
use crate::errors::{SyncError, SyncResult};
use crate::utils;

/// Fixed per-call network timeout. A timeout counts as a connectivity
/// failure, not a hard error.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The orchestrator's view of the remote endpoint: send JSON, get JSON back.
/// Tests substitute this seam with an in-process implementation.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn push(
        &self,
        resource: &str,
        records: &[serde_json::Value],
    ) -> SyncResult<PushResponse>;

    async fn pull(&self, resource: &str, since: DateTime<Utc>) -> SyncResult<PullResponse>;
}

/// HTTP transport against the remote sync service.
pub struct HttpSyncTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSyncTransport {
    pub fn new(base_url: &str) -> SyncResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check_status(resource: &str, response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::UnknownResource(resource.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::ServerError(format!("{}: {}", status, body)));
        }
        Ok(response)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::Timeout
    } else if e.is_connect() {
        SyncError::Network(e.to_string())
    } else if e.is_decode() {
        SyncError::InvalidPayload(e.to_string())
    } else {
        SyncError::Network(e.to_string())
    }
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn push(
        &self,
        resource: &str,
        records: &[serde_json::Value],
    ) -> SyncResult<PushResponse> {
        let url = format!("{}/sync/push/{}", self.base_url, resource);
        let response = self
            .client
            .post(&url)
            .json(records)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::check_status(resource, response)
            .await?
            .json::<PushResponse>()
            .await
            .map_err(map_reqwest_error)
    }

    async fn pull(&self, resource: &str, since: DateTime<Utc>) -> SyncResult<PullResponse> {
        let url = format!("{}/sync/pull/{}", self.base_url, resource);
        let response = self
            .client
            .get(&url)
            .query(&[("since", utils::format_ts(since))])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::check_status(resource, response)
            .await?
            .json::<PullResponse>()
            .await
            .map_err(map_reqwest_error)
    }
}
