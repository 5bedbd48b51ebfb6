use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domains::core::entity::SyncEntity;
use crate::domains::core::repository::SyncRepository;
use crate::domains::sync::checkpoint::CheckpointStore;
use crate::domains::sync::transport::SyncTransport;
use crate::domains::sync::types::{RunStatus, SyncPhase, SyncReport};
use crate::errors::{DomainError, DomainResult, ValidationError};

/// Object-safe facade the orchestrator drives, one per registered entity
/// kind. Records cross this boundary as plain JSON so the engine stays
/// ignorant of concrete entity types.
#[async_trait]
pub trait SyncResource: Send + Sync {
    fn resource_name(&self) -> &'static str;

    /// Serialize every record with unacknowledged local changes.
    async fn collect_dirty(&self) -> DomainResult<Vec<serde_json::Value>>;

    async fn mark_synced(&self, ids: &[Uuid]) -> DomainResult<()>;

    /// Apply server records through the hook-exempt path. Returns how many
    /// were applied.
    async fn apply_remote(&self, records: &[serde_json::Value]) -> DomainResult<usize>;
}

#[async_trait]
impl<T: SyncEntity> SyncResource for SyncRepository<T> {
    fn resource_name(&self) -> &'static str {
        T::RESOURCE
    }

    async fn collect_dirty(&self) -> DomainResult<Vec<serde_json::Value>> {
        self.find_dirty()
            .await?
            .into_iter()
            .map(|entity| {
                serde_json::to_value(&entity)
                    .map_err(|e| DomainError::Internal(format!("serialize {}: {}", T::RESOURCE, e)))
            })
            .collect()
    }

    async fn mark_synced(&self, ids: &[Uuid]) -> DomainResult<()> {
        SyncRepository::mark_synced(self, ids).await
    }

    async fn apply_remote(&self, records: &[serde_json::Value]) -> DomainResult<usize> {
        let mut parsed = Vec::with_capacity(records.len());
        for record in records {
            let entity: T = serde_json::from_value(record.clone()).map_err(|e| {
                DomainError::Validation(ValidationError::custom(format!(
                    "malformed {} record from server: {}",
                    T::RESOURCE,
                    e
                )))
            })?;
            parsed.push(entity);
        }

        self.upsert_from_remote(parsed).await
    }
}

/// Client-side sync orchestrator.
///
/// Drives one push-then-pull cycle across the registered resources, in
/// registration order. Register referenced kinds first (teams before
/// participants) so the server never receives a dangling reference.
pub struct SyncEngine {
    transport: Arc<dyn SyncTransport>,
    checkpoints: CheckpointStore,
    resources: Vec<Arc<dyn SyncResource>>,
    run_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(transport: Arc<dyn SyncTransport>, checkpoints: CheckpointStore) -> Self {
        Self {
            transport,
            checkpoints,
            resources: Vec::new(),
            run_lock: Mutex::new(()),
        }
    }

    /// Register a resource. Order matters: it is the push and pull order.
    pub fn register(&mut self, resource: Arc<dyn SyncResource>) {
        self.resources.push(resource);
    }

    /// Run one sync cycle and return the end-of-run summary.
    ///
    /// Never runs concurrently with itself: a trigger while a run is in
    /// flight returns immediately with `AlreadyRunning`. A connectivity
    /// failure ends the run as `Offline` without touching committed progress;
    /// any other per-resource failure is recorded and the remaining
    /// resources still get their turn.
    pub async fn sync(&self) -> SyncReport {
        let Ok(_guard) = self.run_lock.try_lock() else {
            log::warn!("sync trigger ignored: a run is already in flight");
            return SyncReport::already_running();
        };

        let mut report = SyncReport::new();

        log::info!("sync: {} -> {}", SyncPhase::Idle.as_str(), SyncPhase::Pushing.as_str());
        for resource in &self.resources {
            match self.push_resource(resource.as_ref(), &mut report).await {
                Ok(()) => {}
                Err(DomainError::Sync(e)) if e.is_connectivity() => {
                    log::warn!("sync offline during push of {}: {}", resource.resource_name(), e);
                    report.status = RunStatus::Offline;
                    return report;
                }
                Err(e) => {
                    log::error!("push {} failed: {}", resource.resource_name(), e);
                    report.errors.push(format!("push {}: {}", resource.resource_name(), e));
                }
            }
        }

        log::info!("sync: {} -> {}", SyncPhase::Pushing.as_str(), SyncPhase::Pulling.as_str());
        for resource in &self.resources {
            match self.pull_resource(resource.as_ref(), &mut report).await {
                Ok(()) => {}
                Err(DomainError::Sync(e)) if e.is_connectivity() => {
                    log::warn!("sync offline during pull of {}: {}", resource.resource_name(), e);
                    report.status = RunStatus::Offline;
                    return report;
                }
                Err(e) => {
                    log::error!("pull {} failed: {}", resource.resource_name(), e);
                    report.errors.push(format!("pull {}: {}", resource.resource_name(), e));
                }
            }
        }

        report.status = if report.errors.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Error
        };
        log::info!(
            "sync: {} -> {} (pushed {}, pulled {}, conflicts {})",
            SyncPhase::Pulling.as_str(),
            SyncPhase::Done.as_str(),
            report.pushed,
            report.pulled,
            report.conflicts.len()
        );

        report
    }

    async fn push_resource(
        &self,
        resource: &dyn SyncResource,
        report: &mut SyncReport,
    ) -> DomainResult<()> {
        let dirty = resource.collect_dirty().await?;
        if dirty.is_empty() {
            return Ok(());
        }

        let response = self
            .transport
            .push(resource.resource_name(), &dirty)
            .await
            .map_err(DomainError::Sync)?;

        // Only the server-acknowledged subset may be marked clean; anything
        // else stays pending for the next run.
        resource.mark_synced(&response.processed_ids).await?;
        report.pushed += response.processed_ids.len();
        report.conflicts.extend(response.conflict_ids.iter().copied());

        // Rejected and conflicted records stay pending; a rejection needs a
        // local correction before a retry can succeed, so it is surfaced
        // per id rather than silently requeued as progress.
        for rejection in &response.rejected {
            report.rejected.push(format!(
                "{}/{}: {}",
                resource.resource_name(),
                rejection
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                rejection.reason
            ));
        }

        log::debug!(
            "pushed {} {} records ({} conflicts, {} rejected)",
            response.processed_ids.len(),
            resource.resource_name(),
            response.conflict_ids.len(),
            response.rejected.len()
        );

        Ok(())
    }

    async fn pull_resource(
        &self,
        resource: &dyn SyncResource,
        report: &mut SyncReport,
    ) -> DomainResult<()> {
        let since = self.checkpoints.get(resource.resource_name()).await?;

        let response = self
            .transport
            .pull(resource.resource_name(), since)
            .await
            .map_err(DomainError::Sync)?;

        let applied = resource.apply_remote(&response.changes).await?;
        report.pulled += applied;

        // The server clock is the sole "since" reference; only advance once
        // the changes are committed locally.
        self.checkpoints
            .advance(resource.resource_name(), response.current_server_time)
            .await?;

        log::debug!("pulled {} {} records", applied, resource.resource_name());

        Ok(())
    }
}
