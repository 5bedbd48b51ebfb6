use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::context::AuthContext;
use crate::domains::core::repository::SyncRepository;
use crate::domains::user::repository::UserQueries;
use crate::domains::user::types::{User, UserRole};
use crate::errors::{ServiceError, ServiceResult};

/// Hash a password with a fresh random salt. Stored as `salt$hex(sha256)`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = Sha256::digest(format!("{}{}", salt, password).as_bytes());
    format!("{}${}", salt, hex::encode(digest))
}

/// Check a password against a stored `salt$hash` pair.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => {
            let digest = Sha256::digest(format!("{}{}", salt, password).as_bytes());
            hex::encode(digest) == hash
        }
        None => false,
    }
}

/// Credential checks against the local store, so login works with no
/// connectivity at all.
pub struct AuthService {
    users: Arc<SyncRepository<User>>,
}

impl AuthService {
    pub fn new(users: Arc<SyncRepository<User>>) -> Self {
        Self { users }
    }

    /// Verify credentials and build the session context. A missing account
    /// and a wrong password produce the same error, on purpose.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        offline_mode: bool,
    ) -> ServiceResult<AuthContext> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .filter(|u| verify_password(password, &u.password_hash))
            .ok_or_else(|| ServiceError::Authentication("invalid credentials".to_string()))?;

        log::info!("authenticated {} as {}", user.email, user.role.as_str());
        Ok(AuthContext::new(user.meta.id, user.role, offline_mode))
    }

    /// Create the bootstrap admin account on a fresh device. No-op once
    /// any account exists.
    pub async fn seed_admin_if_empty(
        &self,
        email: &str,
        password: &str,
    ) -> ServiceResult<Option<User>> {
        if !self.users.find_all().await?.is_empty() {
            return Ok(None);
        }

        let admin = User::new(email, &hash_password(password), "Administrator", UserRole::Admin);
        let saved = self.users.save(admin).await?;
        log::info!("seeded bootstrap admin account {}", email);
        Ok(Some(saved))
    }
}
