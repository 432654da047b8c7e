/// Account bans
use crate::{
    db::{ActivityLog, ActivityType},
    error::{AppError, AppResult},
    rbac::Capability,
    session::Viewer,
    store::ProfileStore,
};
use std::sync::Arc;

/// Moderation manager
#[derive(Clone)]
pub struct ModerationManager {
    profiles: Arc<dyn ProfileStore>,
    activity: ActivityLog,
}

impl ModerationManager {
    pub fn new(profiles: Arc<dyn ProfileStore>, activity: ActivityLog) -> Self {
        Self { profiles, activity }
    }

    /// Ban a user. Banned users are rejected by the API.
    pub async fn ban(&self, viewer: &Viewer, uid: &str, reason: Option<&str>) -> AppResult<()> {
        self.set_banned(viewer, uid, true, reason).await
    }

    /// Lift a ban
    pub async fn unban(&self, viewer: &Viewer, uid: &str) -> AppResult<()> {
        self.set_banned(viewer, uid, false, None).await
    }

    /// Whether a user is banned. Missing profiles are not banned.
    pub async fn is_banned(&self, uid: &str) -> AppResult<bool> {
        self.profiles.is_banned(uid).await
    }

    async fn set_banned(
        &self,
        viewer: &Viewer,
        uid: &str,
        banned: bool,
        reason: Option<&str>,
    ) -> AppResult<()> {
        viewer.require(Capability::BanUsers)?;

        if viewer.uid == uid {
            return Err(AppError::Authorization("You cannot ban yourself".to_string()));
        }

        self.profiles.set_banned(uid, banned).await?;

        let activity = if banned {
            tracing::warn!("{} banned {}: {}", viewer.uid, uid, reason.unwrap_or("no reason"));
            ActivityType::UserBan
        } else {
            tracing::info!("{} unbanned {}", viewer.uid, uid);
            ActivityType::UserUnban
        };
        self.activity
            .record(&viewer.uid, activity, Some(uid), reason)
            .await;

        Ok(())
    }
}
