/// Report lifecycle manager
///
/// Members file reports; moderators move each one from `pending` to exactly one
/// terminal status. Transitions are conditional writes, so of two racing
/// moderators only one succeeds and the other gets `InvalidTransition`.
use crate::{
    error::{AppError, AppResult},
    metrics,
    rbac::Capability,
    reports::{
        ContentRef, Report, ReportChange, ReportDraft, ReportFeed, ReportStatus,
        ReportSubscription, StatusFilter,
    },
    session::Viewer,
    store::{ContentStore, ReportStore},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Report workflow service
#[derive(Clone)]
pub struct ReportLifecycle {
    reports: Arc<dyn ReportStore>,
    content: Arc<dyn ContentStore>,
    feed: ReportFeed,
}

impl ReportLifecycle {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        content: Arc<dyn ContentStore>,
        feed: ReportFeed,
    ) -> Self {
        Self {
            reports,
            content,
            feed,
        }
    }

    pub fn feed(&self) -> &ReportFeed {
        &self.feed
    }

    /// File a new pending report. Every check runs before anything is written.
    pub async fn create(&self, viewer: &Viewer, draft: ReportDraft) -> AppResult<Report> {
        viewer.require(Capability::Report)?;

        let reason = draft
            .reason
            .ok_or_else(|| AppError::Validation("Report reason is required".to_string()))?;

        let details = draft.details.trim();
        if details.is_empty() {
            return Err(AppError::Validation("Report details are required".to_string()));
        }

        let author = self.content.author_of(&draft.item).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "{} {} not found",
                draft.item.item_type, draft.item.item_id
            ))
        })?;

        if author == viewer.uid {
            return Err(AppError::Validation(
                "You cannot report your own content".to_string(),
            ));
        }

        let report = Report {
            id: Uuid::new_v4().to_string(),
            item_id: draft.item.item_id,
            item_type: draft.item.item_type,
            reporter_id: viewer.uid.clone(),
            reporter_name: viewer.display_name.clone(),
            reason,
            details: details.to_string(),
            content_preview: draft.content_preview,
            status: ReportStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        };

        self.reports.insert(&report).await?;

        metrics::record_report_created(reason.as_str(), report.item_type.as_str());
        tracing::info!(
            "Report {} filed by {} against {} {} ({})",
            report.id,
            viewer.uid,
            report.item_type,
            report.item_id,
            reason.as_str()
        );
        self.feed.publish(ReportChange::Created {
            report_id: report.id.clone(),
        });

        Ok(report)
    }

    /// Mark a pending report as handled without removing content
    pub async fn resolve(&self, viewer: &Viewer, report_id: &str) -> AppResult<Report> {
        self.transition(viewer, report_id, ReportStatus::Resolved)
            .await
    }

    /// Close a pending report as unfounded
    pub async fn dismiss(&self, viewer: &Viewer, report_id: &str) -> AppResult<Report> {
        self.transition(viewer, report_id, ReportStatus::Dismissed)
            .await
    }

    /// Mark a pending report removed, then delete the reported content.
    ///
    /// The two writes are not atomic. If the deletion fails the report stays
    /// `removed` and `InconsistentState` is returned; use
    /// [`retry_content_removal`](Self::retry_content_removal) to finish.
    pub async fn remove(&self, viewer: &Viewer, report_id: &str) -> AppResult<Report> {
        let report = self
            .transition(viewer, report_id, ReportStatus::Removed)
            .await?;

        self.delete_reported_content(&report).await?;
        Ok(report)
    }

    /// Retry the content deletion for a report already marked removed
    pub async fn retry_content_removal(&self, viewer: &Viewer, report_id: &str) -> AppResult<Report> {
        viewer.require(Capability::HandleReports)?;

        let report = self.load(report_id).await?;

        if report.status != ReportStatus::Removed {
            return Err(AppError::Conflict(format!(
                "Report {} is {}, not removed",
                report.id, report.status
            )));
        }

        self.delete_reported_content(&report).await?;
        tracing::info!("Content removal for report {} completed on retry", report.id);
        Ok(report)
    }

    /// Reports matching `filter`, newest first
    pub async fn list(
        &self,
        viewer: &Viewer,
        filter: StatusFilter,
        limit: i64,
    ) -> AppResult<Vec<Report>> {
        viewer.require(Capability::HandleReports)?;
        self.reports.list(filter, limit).await
    }

    /// Live listing for moderators. The first snapshot is available immediately.
    pub fn subscribe(
        &self,
        viewer: &Viewer,
        filter: StatusFilter,
        limit: i64,
    ) -> AppResult<ReportSubscription> {
        viewer.require(Capability::HandleReports)?;
        Ok(self.feed.subscribe(self.reports.clone(), filter, limit))
    }

    /// Delete reports targeting an item that no longer exists, keeping `keep`
    pub async fn purge_reports_for(&self, item: &ContentRef, keep: Option<&str>) -> AppResult<u64> {
        let count = self.reports.delete_for_item(item, keep).await?;
        if count > 0 {
            tracing::debug!(
                "Purged {} reports for {} {}",
                count,
                item.item_type,
                item.item_id
            );
            self.feed.publish(ReportChange::Purged {
                item: item.clone(),
                count,
            });
        }
        Ok(count)
    }

    async fn transition(
        &self,
        viewer: &Viewer,
        report_id: &str,
        to: ReportStatus,
    ) -> AppResult<Report> {
        viewer.require(Capability::HandleReports)?;

        let mut report = self.load(report_id).await?;
        if !report.status.can_transition_to(to) {
            return Err(self.rejected(report_id, report.status, to));
        }

        let now = Utc::now();
        let applied = self
            .reports
            .transition(report_id, to, &viewer.uid, now)
            .await?;

        if !applied {
            // Another moderator got there first
            let current = self.load(report_id).await?;
            return Err(self.rejected(report_id, current.status, to));
        }

        // The write is committed; nothing below may fail
        report.status = to;
        report.resolved_by = Some(viewer.uid.clone());
        report.resolved_at = Some(now);

        metrics::record_report_transition(to.as_str());
        tracing::info!("Report {} {} by {}", report_id, to, viewer.uid);
        self.feed.publish(ReportChange::Transitioned {
            report_id: report_id.to_string(),
            status: to,
        });

        Ok(report)
    }

    async fn load(&self, report_id: &str) -> AppResult<Report> {
        self.reports
            .get(report_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))
    }

    fn rejected(&self, report_id: &str, from: ReportStatus, to: ReportStatus) -> AppError {
        metrics::record_transition_rejected(to.as_str());
        tracing::debug!(
            "Rejected transition of report {} from {} to {}",
            report_id,
            from,
            to
        );
        AppError::InvalidTransition {
            report_id: report_id.to_string(),
            from,
            to,
        }
    }

    async fn delete_reported_content(&self, report: &Report) -> AppResult<()> {
        let item = report.item();

        match self.delete_item(&item).await {
            Ok(answer_ids) => {
                let keep = Some(report.id.as_str());
                if let Err(e) = self.purge_after_delete(&item, &answer_ids, keep).await {
                    tracing::error!(
                        "Content for report {} deleted but purging its reports failed: {}",
                        report.id,
                        e
                    );
                }
                Ok(())
            }
            Err(e) => {
                metrics::record_inconsistent_removal();
                tracing::error!(
                    "Report {} marked removed but deleting {} {} failed: {}",
                    report.id,
                    item.item_type,
                    item.item_id,
                    e
                );
                Err(AppError::InconsistentState {
                    report_id: report.id.clone(),
                    item_type: item.item_type,
                    item_id: item.item_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Delete the item, returning the ids of answers removed along with a question
    async fn delete_item(&self, item: &ContentRef) -> AppResult<Vec<String>> {
        match self.content.delete(item).await? {
            Some(answer_ids) => Ok(answer_ids),
            None => {
                tracing::debug!("{} {} was already deleted", item.item_type, item.item_id);
                Ok(Vec::new())
            }
        }
    }

    /// Purge reports for a deleted item and the answers that went with it,
    /// keeping `keep`
    pub async fn purge_after_delete(
        &self,
        item: &ContentRef,
        answer_ids: &[String],
        keep: Option<&str>,
    ) -> AppResult<()> {
        self.purge_reports_for(item, keep).await?;
        for answer_id in answer_ids {
            self.purge_reports_for(&ContentRef::answer(answer_id.as_str()), keep)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_pool, SqliteContentStore, SqliteReportStore};
    use crate::rbac::Role;
    use crate::reports::ReportReason;
    use async_trait::async_trait;
    use sqlx::SqlitePool;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Content store whose deletes always fail
    struct UnavailableDeletes(SqliteContentStore);

    #[async_trait]
    impl ContentStore for UnavailableDeletes {
        async fn author_of(&self, item: &ContentRef) -> AppResult<Option<String>> {
            self.0.author_of(item).await
        }

        async fn delete(&self, _item: &ContentRef) -> AppResult<Option<Vec<String>>> {
            Err(AppError::Remote("content backend unavailable".to_string()))
        }
    }

    /// Report store whose reads fail once any transition has been written
    struct ReadsFailAfterWrite {
        inner: SqliteReportStore,
        written: AtomicBool,
    }

    #[async_trait]
    impl ReportStore for ReadsFailAfterWrite {
        async fn insert(&self, report: &Report) -> AppResult<()> {
            self.inner.insert(report).await
        }

        async fn get(&self, id: &str) -> AppResult<Option<Report>> {
            if self.written.load(Ordering::SeqCst) {
                return Err(AppError::Remote("read timeout".to_string()));
            }
            self.inner.get(id).await
        }

        async fn list(&self, filter: StatusFilter, limit: i64) -> AppResult<Vec<Report>> {
            self.inner.list(filter, limit).await
        }

        async fn transition(
            &self,
            id: &str,
            status: ReportStatus,
            resolved_by: &str,
            resolved_at: chrono::DateTime<Utc>,
        ) -> AppResult<bool> {
            let applied = self.inner.transition(id, status, resolved_by, resolved_at).await?;
            self.written.store(true, Ordering::SeqCst);
            Ok(applied)
        }

        async fn delete_for_item(&self, item: &ContentRef, keep: Option<&str>) -> AppResult<u64> {
            self.inner.delete_for_item(item, keep).await
        }

        async fn count_by_status(&self) -> AppResult<Vec<(ReportStatus, i64)>> {
            self.inner.count_by_status().await
        }
    }

    struct Fixture {
        pool: SqlitePool,
        content: SqliteContentStore,
        lifecycle: ReportLifecycle,
        question_id: String,
    }

    async fn fixture() -> Fixture {
        let pool = memory_pool().await.unwrap();
        let content = SqliteContentStore::new(pool.clone());
        let question = content
            .create_question("author", "How do lifetimes work?", "Asking for a friend")
            .await
            .unwrap();

        let lifecycle = ReportLifecycle::new(
            Arc::new(SqliteReportStore::new(pool.clone())),
            Arc::new(content.clone()),
            ReportFeed::new(16),
        );

        Fixture {
            pool,
            content,
            lifecycle,
            question_id: question.id,
        }
    }

    fn member(uid: &str) -> Viewer {
        Viewer::new(uid, Some(uid.to_string()), Role::User)
    }

    fn moderator() -> Viewer {
        Viewer::new("mod", Some("mod".to_string()), Role::Moderator)
    }

    fn draft(item: ContentRef) -> ReportDraft {
        ReportDraft {
            item,
            reason: Some(ReportReason::Spam),
            details: "  link farm  ".to_string(),
            content_preview: Some("How do lifetimes work?".to_string()),
        }
    }

    async fn report_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM report")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_pending_report() {
        let f = fixture().await;

        let report = f
            .lifecycle
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.details, "link farm");
        assert_eq!(report.reporter_name.as_deref(), Some("bob"));
        assert!(report.resolved_at.is_none());
    }

    #[tokio::test]
    async fn test_create_rejections_write_nothing() {
        let f = fixture().await;
        let item = ContentRef::question(&f.question_id);

        let own = f.lifecycle.create(&member("author"), draft(item.clone())).await;
        assert!(matches!(own, Err(AppError::Validation(_))));

        let mut blank = draft(item.clone());
        blank.details = "   ".to_string();
        let blank = f.lifecycle.create(&member("bob"), blank).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        let mut no_reason = draft(item.clone());
        no_reason.reason = None;
        let no_reason = f.lifecycle.create(&member("bob"), no_reason).await;
        assert!(matches!(no_reason, Err(AppError::Validation(_))));

        let missing = f
            .lifecycle
            .create(&member("bob"), draft(ContentRef::answer("nope")))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        assert_eq!(report_count(&f.pool).await, 0);
    }

    #[tokio::test]
    async fn test_members_cannot_handle_reports() {
        let f = fixture().await;
        let report = f
            .lifecycle
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();

        let result = f.lifecycle.resolve(&member("carol"), &report.id).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        let result = f
            .lifecycle
            .list(&member("carol"), StatusFilter::All, 10)
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_terminal_reports_reject_transitions() {
        let f = fixture().await;
        let report = f
            .lifecycle
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();

        let resolved = f.lifecycle.resolve(&moderator(), &report.id).await.unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("mod"));
        assert!(resolved.resolved_at.is_some());

        match f.lifecycle.dismiss(&moderator(), &report.id).await {
            Err(AppError::InvalidTransition { from, to, .. }) => {
                assert_eq!(from, ReportStatus::Resolved);
                assert_eq!(to, ReportStatus::Dismissed);
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }

        let listed = f
            .lifecycle
            .list(&moderator(), StatusFilter::Only(ReportStatus::Resolved), 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_transitions_have_one_winner() {
        let f = fixture().await;
        let report = f
            .lifecycle
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();

        let first = {
            let lifecycle = f.lifecycle.clone();
            let id = report.id.clone();
            tokio::spawn(async move { lifecycle.resolve(&moderator(), &id).await })
        };
        let second = {
            let lifecycle = f.lifecycle.clone();
            let id = report.id.clone();
            tokio::spawn(async move { lifecycle.dismiss(&moderator(), &id).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::InvalidTransition { .. })))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(losers, 1);
    }

    #[tokio::test]
    async fn test_remove_deletes_content_and_sibling_reports() {
        let f = fixture().await;
        let item = ContentRef::question(&f.question_id);

        let first = f.lifecycle.create(&member("bob"), draft(item.clone())).await.unwrap();
        f.lifecycle.create(&member("carol"), draft(item.clone())).await.unwrap();

        let removed = f.lifecycle.remove(&moderator(), &first.id).await.unwrap();
        assert_eq!(removed.status, ReportStatus::Removed);

        assert!(f.content.get_question(&f.question_id).await.unwrap().is_none());

        let remaining = f
            .lifecycle
            .list(&moderator(), StatusFilter::All, 10)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.id);
    }

    #[tokio::test]
    async fn test_failed_delete_is_inconsistent_state_and_retryable() {
        let f = fixture().await;
        let broken = ReportLifecycle::new(
            Arc::new(SqliteReportStore::new(f.pool.clone())),
            Arc::new(UnavailableDeletes(f.content.clone())),
            ReportFeed::new(16),
        );

        let report = broken
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();

        match broken.remove(&moderator(), &report.id).await {
            Err(AppError::InconsistentState { report_id, item_id, .. }) => {
                assert_eq!(report_id, report.id);
                assert_eq!(item_id, f.question_id);
            }
            other => panic!("expected InconsistentState, got {:?}", other),
        }

        // Status stays removed while the content survives
        let stored = f
            .lifecycle
            .list(&moderator(), StatusFilter::Only(ReportStatus::Removed), 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(f.content.get_question(&f.question_id).await.unwrap().is_some());

        f.lifecycle
            .retry_content_removal(&moderator(), &report.id)
            .await
            .unwrap();
        assert!(f.content.get_question(&f.question_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_completes_when_reads_fail_after_write() {
        let f = fixture().await;
        let lifecycle = ReportLifecycle::new(
            Arc::new(ReadsFailAfterWrite {
                inner: SqliteReportStore::new(f.pool.clone()),
                written: AtomicBool::new(false),
            }),
            Arc::new(f.content.clone()),
            ReportFeed::new(16),
        );

        let report = lifecycle
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();

        let removed = lifecycle.remove(&moderator(), &report.id).await.unwrap();
        assert_eq!(removed.status, ReportStatus::Removed);
        assert_eq!(removed.resolved_by.as_deref(), Some("mod"));
        assert!(removed.resolved_at.is_some());

        // The content is gone and the stored report agrees
        assert!(f.content.get_question(&f.question_id).await.unwrap().is_none());
        let stored = f
            .lifecycle
            .list(&moderator(), StatusFilter::Only(ReportStatus::Removed), 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, report.id);
    }

    #[tokio::test]
    async fn test_retry_requires_removed_status() {
        let f = fixture().await;
        let report = f
            .lifecycle
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();

        let result = f
            .lifecycle
            .retry_content_removal(&moderator(), &report.id)
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_subscription_sees_transitions() {
        let f = fixture().await;
        let mut pending = f
            .lifecycle
            .subscribe(&moderator(), StatusFilter::Only(ReportStatus::Pending), 10)
            .unwrap();
        assert!(pending.next_snapshot().await.unwrap().unwrap().is_empty());

        let report = f
            .lifecycle
            .create(&member("bob"), draft(ContentRef::question(&f.question_id)))
            .await
            .unwrap();
        assert_eq!(pending.next_snapshot().await.unwrap().unwrap().len(), 1);

        f.lifecycle.dismiss(&moderator(), &report.id).await.unwrap();
        assert!(pending.next_snapshot().await.unwrap().unwrap().is_empty());

        assert!(matches!(
            f.lifecycle.subscribe(&member("bob"), StatusFilter::All, 10),
            Err(AppError::Authorization(_))
        ));
    }
}
