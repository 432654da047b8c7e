/// Admin Role Management
use crate::{
    account::Profile,
    db::{ActivityLog, ActivityType},
    error::{AppError, AppResult},
    rbac::{capabilities_of, Capability, Role},
    session::Viewer,
    store::ProfileStore,
};
use serde::Serialize;
use std::sync::Arc;

/// A role and what it grants, for the role management view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrant {
    pub role: Role,
    pub capabilities: Vec<Capability>,
}

/// Role manager
#[derive(Clone)]
pub struct RoleManager {
    profiles: Arc<dyn ProfileStore>,
    activity: ActivityLog,
}

impl RoleManager {
    pub fn new(profiles: Arc<dyn ProfileStore>, activity: ActivityLog) -> Self {
        Self { profiles, activity }
    }

    /// Every role with its granted capabilities, lowest first
    pub fn role_table() -> Vec<RoleGrant> {
        Role::ALL
            .iter()
            .map(|role| RoleGrant {
                role: *role,
                capabilities: capabilities_of(*role),
            })
            .collect()
    }

    /// Change one user's role. Admins cannot change their own role.
    pub async fn set_role(&self, viewer: &Viewer, uid: &str, role: Role) -> AppResult<()> {
        viewer.require(Capability::ManageRoles)?;

        if viewer.uid == uid {
            return Err(AppError::Authorization(
                "You cannot change your own role".to_string(),
            ));
        }

        self.profiles.set_role(uid, role).await?;

        tracing::info!("{} set role of {} to {}", viewer.uid, uid, role);
        self.activity
            .record(&viewer.uid, ActivityType::RoleChange, Some(uid), Some(role.as_str()))
            .await;

        Ok(())
    }

    /// Set the same role on several users in one transaction
    pub async fn set_roles(&self, viewer: &Viewer, uids: &[String], role: Role) -> AppResult<()> {
        viewer.require(Capability::ManageRoles)?;

        if uids.is_empty() {
            return Err(AppError::Validation("No users selected".to_string()));
        }
        if uids.iter().any(|uid| *uid == viewer.uid) {
            return Err(AppError::Authorization(
                "You cannot change your own role".to_string(),
            ));
        }

        self.profiles.set_roles(uids, role).await?;

        tracing::info!("{} set role of {} users to {}", viewer.uid, uids.len(), role);
        for uid in uids {
            self.activity
                .record(&viewer.uid, ActivityType::RoleChange, Some(uid.as_str()), Some(role.as_str()))
                .await;
        }

        Ok(())
    }

    /// Profiles with their roles, newest first
    pub async fn list_users(&self, viewer: &Viewer, limit: i64) -> AppResult<Vec<Profile>> {
        if !viewer.can(Capability::ManageRoles) {
            viewer.require(Capability::BanUsers)?;
        }
        self.profiles.list_profiles(limit).await
    }
}
