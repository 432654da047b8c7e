/// Collaborator store interfaces
///
/// The permission evaluator, guards and report workflow only talk to these
/// traits. `crate::db` provides the SQLite implementations.
use crate::{
    account::{Profile, ProfileUpdate},
    error::AppResult,
    rbac::Role,
    reports::{ContentRef, Report, ReportStatus, StatusFilter},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// User profile records, including the role field
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Stored role for a user; `Ok(None)` when the profile does not exist
    async fn get_role(&self, uid: &str) -> AppResult<Option<Role>>;

    async fn set_role(&self, uid: &str, role: Role) -> AppResult<()>;

    /// Set the same role on many users atomically
    async fn set_roles(&self, uids: &[String], role: Role) -> AppResult<()>;

    async fn create_profile(&self, profile: &Profile) -> AppResult<()>;

    async fn get_profile(&self, uid: &str) -> AppResult<Option<Profile>>;

    async fn update_profile(&self, uid: &str, update: &ProfileUpdate) -> AppResult<()>;

    async fn set_banned(&self, uid: &str, banned: bool) -> AppResult<()>;

    /// Ban flag, readable even when the stored role is not
    async fn is_banned(&self, uid: &str) -> AppResult<bool>;

    async fn list_profiles(&self, limit: i64) -> AppResult<Vec<Profile>>;
}

/// Report records
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, report: &Report) -> AppResult<()>;

    async fn get(&self, id: &str) -> AppResult<Option<Report>>;

    /// Reports matching `filter`, newest first
    async fn list(&self, filter: StatusFilter, limit: i64) -> AppResult<Vec<Report>>;

    /// Move a pending report into `status`.
    ///
    /// Returns `false` without writing when the report is missing or no longer pending.
    async fn transition(
        &self,
        id: &str,
        status: ReportStatus,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Delete every report targeting `item`, except `keep`
    async fn delete_for_item(&self, item: &ContentRef, keep: Option<&str>) -> AppResult<u64>;

    async fn count_by_status(&self) -> AppResult<Vec<(ReportStatus, i64)>>;
}

/// Questions and answers, as far as moderation needs them
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Author of the item; `Ok(None)` when it does not exist
    async fn author_of(&self, item: &ContentRef) -> AppResult<Option<String>>;

    /// Delete the item, and a question's answers with it.
    ///
    /// Returns the ids of the answers removed alongside, or `None` when the
    /// item was already gone.
    async fn delete(&self, item: &ContentRef) -> AppResult<Option<Vec<String>>>;
}
