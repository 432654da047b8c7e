/// Community analytics
use crate::{
    db::{SqliteContentStore, SqliteProfileStore},
    error::AppResult,
    rbac::{Capability, Role},
    reports::ReportStatus,
    session::Viewer,
    store::ReportStore,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Snapshot of community totals
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityStats {
    pub total_users: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub reports_by_status: BTreeMap<String, i64>,
    pub pending_reports: i64,
    pub total_questions: i64,
    pub total_answers: i64,
}

/// Analytics service
#[derive(Clone)]
pub struct StatsService {
    profiles: SqliteProfileStore,
    reports: Arc<dyn ReportStore>,
    content: SqliteContentStore,
}

impl StatsService {
    pub fn new(
        profiles: SqliteProfileStore,
        reports: Arc<dyn ReportStore>,
        content: SqliteContentStore,
    ) -> Self {
        Self {
            profiles,
            reports,
            content,
        }
    }

    pub async fn collect(&self, viewer: &Viewer) -> AppResult<CommunityStats> {
        viewer.require(Capability::ViewAnalytics)?;

        // Every tier is listed, including empty ones
        let mut users_by_role: BTreeMap<String, i64> = Role::ALL
            .iter()
            .map(|role| (role.as_str().to_string(), 0))
            .collect();
        for (role, count) in self.profiles.count_by_role().await? {
            users_by_role.insert(role.as_str().to_string(), count);
        }

        let mut reports_by_status: BTreeMap<String, i64> = ReportStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        for (status, count) in self.reports.count_by_status().await? {
            reports_by_status.insert(status.as_str().to_string(), count);
        }

        let (total_questions, total_answers) = self.content.totals().await?;

        Ok(CommunityStats {
            total_users: users_by_role.values().sum(),
            pending_reports: reports_by_status
                .get(ReportStatus::Pending.as_str())
                .copied()
                .unwrap_or(0),
            users_by_role,
            reports_by_status,
            total_questions,
            total_answers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Profile;
    use crate::db::{memory_pool, SqliteReportStore};
    use crate::error::AppError;
    use crate::store::ProfileStore;

    #[tokio::test]
    async fn test_stats_require_analytics_capability() {
        let pool = memory_pool().await.unwrap();
        let profiles = SqliteProfileStore::new(pool.clone());
        let content = SqliteContentStore::new(pool.clone());

        let mut admin = Profile::new("admin", "admin", "admin@example.com");
        admin.role = Role::Admin;
        profiles.create_profile(&admin).await.unwrap();
        profiles
            .create_profile(&Profile::new("u1", "u1", "u1@example.com"))
            .await
            .unwrap();
        content.create_question("u1", "Title", "Body").await.unwrap();

        let stats = StatsService::new(
            profiles,
            Arc::new(SqliteReportStore::new(pool)),
            content,
        );

        let moderator = Viewer::new("mod", None, Role::Moderator);
        assert!(matches!(
            stats.collect(&moderator).await,
            Err(AppError::Authorization(_))
        ));

        let collected = stats
            .collect(&Viewer::new("admin", None, Role::Admin))
            .await
            .unwrap();
        assert_eq!(collected.total_users, 2);
        assert_eq!(collected.users_by_role["moderator"], 0);
        assert_eq!(collected.total_questions, 1);
        assert_eq!(collected.pending_reports, 0);
    }
}
