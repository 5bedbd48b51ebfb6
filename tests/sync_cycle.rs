//! End-to-end cycles between two offline clients and one server, with the
//! HTTP layer replaced by direct service calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fieldsync::database::connect_in_memory;
use fieldsync::db_migration::initialize_database;
use fieldsync::domains::core::entity::SyncState;
use fieldsync::domains::core::repository::SyncRepository;
use fieldsync::domains::core::store::LocalStore;
use fieldsync::domains::participant::types::Participant;
use fieldsync::domains::sync::checkpoint::CheckpointStore;
use fieldsync::domains::sync::engine::SyncEngine;
use fieldsync::domains::sync::transport::SyncTransport;
use fieldsync::domains::sync::types::{PullResponse, PushResponse, RunStatus};
use fieldsync::domains::team::repository::TeamQueries;
use fieldsync::domains::team::types::Team;
use fieldsync::errors::{DomainError, SyncError, SyncResult};
use fieldsync::server::registry::ResourceRegistry;
use fieldsync::server::service::RemoteSyncService;

/// Transport that talks to the sync service in-process.
struct LoopbackTransport {
    service: Arc<RemoteSyncService>,
}

fn to_sync_error(err: DomainError) -> SyncError {
    match err {
        DomainError::Sync(e) => e,
        other => SyncError::ServerError(other.to_string()),
    }
}

#[async_trait]
impl SyncTransport for LoopbackTransport {
    async fn push(
        &self,
        resource: &str,
        records: &[serde_json::Value],
    ) -> SyncResult<PushResponse> {
        self.service
            .push(resource, records)
            .await
            .map_err(to_sync_error)
    }

    async fn pull(&self, resource: &str, since: DateTime<Utc>) -> SyncResult<PullResponse> {
        self.service.pull(resource, since).await.map_err(to_sync_error)
    }
}

/// One simulated device: its own database, repositories and engine.
struct Client {
    teams: Arc<SyncRepository<Team>>,
    participants: Arc<SyncRepository<Participant>>,
    checkpoints: CheckpointStore,
    engine: SyncEngine,
}

impl Client {
    async fn connect(server: &Arc<RemoteSyncService>) -> Client {
        let pool = connect_in_memory().await.unwrap();
        initialize_database(&pool).await.unwrap();

        let store = Arc::new(LocalStore::new(pool.clone()));
        let teams = Arc::new(SyncRepository::<Team>::new(store.clone()));
        let participants = Arc::new(SyncRepository::<Participant>::new(store));

        let transport = Arc::new(LoopbackTransport {
            service: server.clone(),
        });
        let mut engine = SyncEngine::new(transport, CheckpointStore::new(pool.clone()));
        engine.register(teams.clone());
        engine.register(participants.clone());

        Client {
            teams,
            participants,
            checkpoints: CheckpointStore::new(pool),
            engine,
        }
    }
}

async fn server() -> Arc<RemoteSyncService> {
    let pool = connect_in_memory().await.unwrap();
    initialize_database(&pool).await.unwrap();
    Arc::new(RemoteSyncService::new(pool, ResourceRegistry::with_defaults()))
}

#[tokio::test]
async fn test_initialize_creates_and_reopens_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("field.db");

    let pool = fieldsync::initialize(path.to_str().unwrap()).await.unwrap();
    sqlx::query("SELECT COUNT(*) FROM teams")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;

    // Reopening applies nothing new and the schema is still intact.
    let pool = fieldsync::initialize(path.to_str().unwrap()).await.unwrap();
    sqlx::query("SELECT COUNT(*) FROM sys_meta")
        .fetch_one(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_two_clients_converge_through_the_server() {
    let server = server().await;
    let a = Client::connect(&server).await;
    let b = Client::connect(&server).await;

    // A creates a team and pushes it.
    let red = a.teams.save(Team::new("Red", "#D32F2F", "Fire")).await.unwrap();
    let report = a.engine.sync().await;
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.pushed, 1);

    // B starts empty, pulls A's team.
    let report = b.engine.sync().await;
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.pulled, 1);
    let mut b_red = b.teams.find_by_id(red.meta.id).await.unwrap().unwrap();
    assert_eq!(b_red.name, "Red");
    assert_eq!(b_red.meta.sync_status, SyncState::Synced);

    // B renames and pushes; A pulls the edit.
    tokio::time::sleep(Duration::from_millis(2)).await;
    b_red.name = "Crimson".to_string();
    b.teams.save(b_red).await.unwrap();
    let report = b.engine.sync().await;
    assert_eq!(report.pushed, 1);

    let report = a.engine.sync().await;
    assert_eq!(report.status, RunStatus::Success);
    let a_red = a.teams.find_by_id(red.meta.id).await.unwrap().unwrap();
    assert_eq!(a_red.name, "Crimson");
    assert_eq!(a_red.meta.sync_status, SyncState::Synced);
    assert!(a.teams.find_dirty().await.unwrap().is_empty());
    assert!(b.teams.find_dirty().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_edits_resolve_to_last_writer() {
    let server = server().await;
    let a = Client::connect(&server).await;
    let b = Client::connect(&server).await;

    let team = a.teams.save(Team::new("Red", "#D32F2F", "")).await.unwrap();
    a.engine.sync().await;
    b.engine.sync().await;

    // Both devices edit the same record offline; A writes first.
    let mut a_copy = a.teams.find_by_id(team.meta.id).await.unwrap().unwrap();
    a_copy.name = "Scarlet".to_string();
    a.teams.save(a_copy).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2)).await;
    let mut b_copy = b.teams.find_by_id(team.meta.id).await.unwrap().unwrap();
    b_copy.name = "Ruby".to_string();
    b.teams.save(b_copy).await.unwrap();

    // B syncs first, so its later write is on the server when A pushes.
    b.engine.sync().await;
    let report = a.engine.sync().await;
    assert_eq!(report.conflicts, vec![team.meta.id]);

    // A's losing edit is replaced by the server copy during the pull leg.
    let a_view = a.teams.find_by_id(team.meta.id).await.unwrap().unwrap();
    assert_eq!(a_view.name, "Ruby");
    assert_eq!(a_view.meta.sync_status, SyncState::Synced);
}

#[tokio::test]
async fn test_tombstone_propagates_between_devices() {
    let server = server().await;
    let a = Client::connect(&server).await;
    let b = Client::connect(&server).await;

    let team = a.teams.save(Team::new("Red", "#D32F2F", "")).await.unwrap();
    let mut member = Participant::new("Ana Souza", "female");
    member.team_id = Some(team.meta.id);
    let member = a.participants.save(member).await.unwrap();

    a.engine.sync().await;
    b.engine.sync().await;
    assert_eq!(b.participants.find_all().await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(b.participants.soft_delete(member.meta.id).await.unwrap());
    b.engine.sync().await;
    a.engine.sync().await;

    // Deleted on both devices but still present as a tombstone row.
    assert!(a.participants.find_all().await.unwrap().is_empty());
    let row = a.participants.find_by_id(member.meta.id).await.unwrap().unwrap();
    assert!(row.meta.is_deleted);
    assert_eq!(row.meta.sync_status, SyncState::Synced);
}

#[tokio::test]
async fn test_seeded_defaults_sync_to_second_device() {
    let server = server().await;
    let a = Client::connect(&server).await;
    let b = Client::connect(&server).await;

    a.teams.seed_default_teams().await.unwrap();
    assert_eq!(a.teams.find_all().await.unwrap().len(), 5);

    a.engine.sync().await;
    let report = b.engine.sync().await;
    assert_eq!(report.pulled, 5);

    // Seeding on B is now a no-op; the synced set already exists.
    b.teams.seed_default_teams().await.unwrap();
    assert_eq!(b.teams.find_all().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_checkpoints_advance_monotonically_across_runs() {
    let server = server().await;
    let a = Client::connect(&server).await;

    a.teams.save(Team::new("Red", "#D32F2F", "")).await.unwrap();
    a.engine.sync().await;
    let first = a.checkpoints.get("teams").await.unwrap();
    assert!(first > DateTime::<Utc>::UNIX_EPOCH);

    tokio::time::sleep(Duration::from_millis(2)).await;
    a.engine.sync().await;
    let second = a.checkpoints.get("teams").await.unwrap();
    assert!(second >= first);

    // A no-change run pushes and pulls nothing.
    let report = a.engine.sync().await;
    assert_eq!(report.pushed, 0);
    assert_eq!(report.pulled, 0);
}
