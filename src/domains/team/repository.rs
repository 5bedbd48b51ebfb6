use async_trait::async_trait;

use crate::domains::core::repository::SyncRepository;
use crate::domains::team::types::Team;
use crate::errors::DomainResult;

/// Team-specific queries layered over the generic sync repository.
#[async_trait]
pub trait TeamQueries {
    /// Create the default teams on a fresh database so a brand-new offline
    /// install is usable before the first sync. No-op when teams exist.
    async fn seed_default_teams(&self) -> DomainResult<usize>;
}

#[async_trait]
impl TeamQueries for SyncRepository<Team> {
    async fn seed_default_teams(&self) -> DomainResult<usize> {
        if !self.find_all().await?.is_empty() {
            return Ok(0);
        }

        let defaults = [
            Team::new("Red Team", "#D32F2F", "Fire"),
            Team::new("Blue Team", "#1976D2", "Water"),
            Team::new("Yellow Team", "#FBC02D", "Light"),
            Team::new("Green Team", "#388E3C", "Earth"),
            Team::new("Unassigned", "#9E9E9E", "Intake"),
        ];

        let count = defaults.len();
        for team in defaults {
            self.save(team).await?;
        }

        log::info!("seeded {} default teams", count);
        Ok(count)
    }
}
