use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::domains::core::entity::SyncEntity;
use crate::domains::core::repository::SyncRepository;
use crate::domains::participant::types::Participant;
use crate::errors::{DbError, DomainResult};

/// Participant-specific queries layered over the generic sync repository.
#[async_trait]
pub trait ParticipantQueries {
    /// Case-insensitive search over name, nickname and document number.
    /// An empty query lists everything. Tombstoned rows never appear.
    async fn search(&self, query_text: &str) -> DomainResult<Vec<Participant>>;

    /// Live participants assigned to the given team.
    async fn find_by_team(&self, team_id: Uuid) -> DomainResult<Vec<Participant>>;
}

#[async_trait]
impl ParticipantQueries for SyncRepository<Participant> {
    async fn search(&self, query_text: &str) -> DomainResult<Vec<Participant>> {
        let sql = if query_text.is_empty() {
            "SELECT * FROM participants WHERE is_deleted = 0 ORDER BY full_name".to_string()
        } else {
            "SELECT * FROM participants WHERE is_deleted = 0 \
             AND (full_name LIKE ? OR nickname LIKE ? OR document_number LIKE ?) \
             ORDER BY full_name"
                .to_string()
        };

        let mut query = sqlx::query(&sql);
        if !query_text.is_empty() {
            let pattern = format!("%{}%", query_text);
            query = query
                .bind(pattern.clone())
                .bind(pattern.clone())
                .bind(pattern);
        }

        let rows = query
            .fetch_all(self.store().pool())
            .await
            .map_err(DbError::from)?;

        rows.iter().map(Participant::from_row).collect()
    }

    async fn find_by_team(&self, team_id: Uuid) -> DomainResult<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT * FROM participants WHERE is_deleted = 0 AND team_id = ? ORDER BY full_name",
        )
        .bind(team_id.to_string())
        .fetch_all(self.store().pool())
        .await
        .map_err(DbError::from)?;

        rows.iter().map(Participant::from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::database::connect_in_memory;
    use crate::db_migration::initialize_database;
    use crate::domains::core::store::LocalStore;

    async fn repo() -> SyncRepository<Participant> {
        let pool = connect_in_memory().await.unwrap();
        initialize_database(&pool).await.unwrap();
        SyncRepository::new(Arc::new(LocalStore::new(pool)))
    }

    #[tokio::test]
    async fn test_search_matches_name_nickname_and_document() {
        let repo = repo().await;

        let mut ana = Participant::new("Ana Souza", "female");
        ana.nickname = Some("Aninha".to_string());
        ana.document_number = Some("BR-4471".to_string());
        repo.save(ana).await.unwrap();
        repo.save(Participant::new("Bruno Lima", "male")).await.unwrap();

        assert_eq!(repo.search("souza").await.unwrap().len(), 1);
        assert_eq!(repo.search("aninha").await.unwrap().len(), 1);
        assert_eq!(repo.search("4471").await.unwrap().len(), 1);
        assert_eq!(repo.search("").await.unwrap().len(), 2);
        assert!(repo.search("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_team_skips_tombstones() {
        let repo = repo().await;
        let team_id = Uuid::new_v4();

        let mut assigned = Participant::new("Ana Souza", "female");
        assigned.team_id = Some(team_id);
        let assigned = repo.save(assigned).await.unwrap();
        repo.save(Participant::new("Bruno Lima", "male")).await.unwrap();

        assert_eq!(repo.find_by_team(team_id).await.unwrap().len(), 1);

        repo.soft_delete(assigned.meta.id).await.unwrap();
        assert!(repo.find_by_team(team_id).await.unwrap().is_empty());
    }
}
