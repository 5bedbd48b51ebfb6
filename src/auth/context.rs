use uuid::Uuid;

use crate::domains::user::types::UserRole;
use crate::errors::{ServiceError, ServiceResult};

/// Who is acting, passed explicitly to any operation that needs a
/// permission check. There is no ambient global; callers thread the
/// context through.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: UserRole,
    /// True when the session was established without reaching the server.
    pub offline_mode: bool,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: UserRole, offline_mode: bool) -> Self {
        Self {
            user_id,
            role,
            offline_mode,
        }
    }

    pub fn ensure_can_edit_records(&self) -> ServiceResult<()> {
        if self.role.can_edit_records() {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "role {} cannot edit records",
                self.role.as_str()
            )))
        }
    }

    pub fn ensure_can_write_sensitive_fields(&self) -> ServiceResult<()> {
        if self.role.can_write_sensitive_fields() {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "role {} cannot write medical fields",
                self.role.as_str()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_cannot_edit() {
        let ctx = AuthContext::new(Uuid::new_v4(), UserRole::Staff, false);
        assert!(ctx.ensure_can_edit_records().is_err());
        assert!(ctx.ensure_can_write_sensitive_fields().is_err());
    }

    #[test]
    fn test_team_lead_edits_but_no_medical_writes() {
        let ctx = AuthContext::new(Uuid::new_v4(), UserRole::TeamLead, true);
        assert!(ctx.ensure_can_edit_records().is_ok());
        assert!(ctx.ensure_can_write_sensitive_fields().is_err());
    }

    #[test]
    fn test_medic_writes_medical_fields() {
        let ctx = AuthContext::new(Uuid::new_v4(), UserRole::Medic, false);
        assert!(ctx.ensure_can_write_sensitive_fields().is_ok());
    }
}
