use async_trait::async_trait;
use sqlx::Row;

use crate::domains::core::entity::SyncEntity;
use crate::domains::core::repository::SyncRepository;
use crate::domains::user::types::User;
use crate::errors::{DbError, DomainResult};

/// User-specific queries layered over the generic sync repository.
#[async_trait]
pub trait UserQueries {
    /// Look up a live account by its unique email.
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;
}

#[async_trait]
impl UserQueries for SyncRepository<User> {
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE is_deleted = 0 AND email = ?")
            .bind(email)
            .fetch_optional(self.store().pool())
            .await
            .map_err(DbError::from)?;

        row.as_ref().map(User::from_row).transpose()
    }
}
