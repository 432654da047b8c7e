/// Question and answer service
///
/// Creation, editing and deletion with capability checks. Deleting content deletes
/// the reports that target it; deleting a question also takes its answers and
/// their reports.
use crate::{
    db::{ActivityLog, ActivityType, Answer, Question, SqliteContentStore},
    error::{AppError, AppResult},
    rbac::Capability,
    reports::{ContentRef, ItemType, ReportLifecycle},
    session::Viewer,
    store::ContentStore,
};

/// Content service
#[derive(Clone)]
pub struct ContentService {
    store: SqliteContentStore,
    reports: ReportLifecycle,
    activity: ActivityLog,
}

impl ContentService {
    pub fn new(store: SqliteContentStore, reports: ReportLifecycle, activity: ActivityLog) -> Self {
        Self {
            store,
            reports,
            activity,
        }
    }

    pub async fn create_question(&self, viewer: &Viewer, title: &str, body: &str) -> AppResult<Question> {
        viewer.require(Capability::CreateContent)?;

        let question = self.store.create_question(&viewer.uid, title, body).await?;
        self.activity
            .record(&viewer.uid, ActivityType::QuestionCreate, Some(question.id.as_str()), None)
            .await;

        Ok(question)
    }

    pub async fn create_answer(&self, viewer: &Viewer, question_id: &str, body: &str) -> AppResult<Answer> {
        viewer.require(Capability::CreateContent)?;

        let answer = self.store.create_answer(question_id, &viewer.uid, body).await?;
        self.activity
            .record(&viewer.uid, ActivityType::AnswerCreate, Some(answer.id.as_str()), Some(question_id))
            .await;

        Ok(answer)
    }

    pub async fn get_question(&self, id: &str) -> AppResult<Question> {
        self.store
            .get_question(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))
    }

    pub async fn get_answer(&self, id: &str) -> AppResult<Answer> {
        self.store
            .get_answer(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Answer {} not found", id)))
    }

    /// Edit a question. Authors need `canEditOwnContent`; anyone else needs
    /// `canEditAnyContent`.
    pub async fn edit_question(
        &self,
        viewer: &Viewer,
        id: &str,
        title: Option<&str>,
        body: Option<&str>,
    ) -> AppResult<Question> {
        if title.is_none() && body.is_none() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }

        let item = ContentRef::question(id);
        self.authorize(viewer, &item, Capability::EditOwnContent, Capability::EditAnyContent)
            .await?;

        let question = self
            .store
            .update_question(id, title, body)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))?;

        self.activity
            .record(&viewer.uid, ActivityType::QuestionUpdate, Some(id), None)
            .await;
        Ok(question)
    }

    /// Edit an answer, with the same rules as questions
    pub async fn edit_answer(&self, viewer: &Viewer, id: &str, body: &str) -> AppResult<Answer> {
        let item = ContentRef::answer(id);
        self.authorize(viewer, &item, Capability::EditOwnContent, Capability::EditAnyContent)
            .await?;

        let answer = self
            .store
            .update_answer(id, body)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Answer {} not found", id)))?;

        self.activity
            .record(&viewer.uid, ActivityType::AnswerUpdate, Some(id), Some(answer.question_id.as_str()))
            .await;
        Ok(answer)
    }

    /// Delete a question or answer.
    ///
    /// Authors need `canDeleteOwnContent`; anyone else needs `canDeleteAnyContent`.
    pub async fn delete(&self, viewer: &Viewer, item: &ContentRef) -> AppResult<()> {
        self.authorize(viewer, item, Capability::DeleteOwnContent, Capability::DeleteAnyContent)
            .await?;

        let answer_ids = self.store.delete(item).await?.ok_or_else(|| {
            AppError::NotFound(format!("{} {} not found", item.item_type, item.item_id))
        })?;

        // The deletion is committed; a failed purge is only logged
        if let Err(e) = self.reports.purge_after_delete(item, &answer_ids, None).await {
            tracing::error!(
                "Deleted {} {} but purging its reports failed: {}",
                item.item_type,
                item.item_id,
                e
            );
        }

        let activity = match item.item_type {
            ItemType::Question => ActivityType::QuestionDelete,
            ItemType::Answer => ActivityType::AnswerDelete,
        };
        tracing::info!(
            "{} deleted {} {} ({} answers)",
            viewer.uid,
            item.item_type,
            item.item_id,
            answer_ids.len()
        );
        self.activity
            .record(&viewer.uid, activity, Some(item.item_id.as_str()), None)
            .await;

        Ok(())
    }

    /// Authors act through `own`; everyone else needs `any`
    async fn authorize(
        &self,
        viewer: &Viewer,
        item: &ContentRef,
        own: Capability,
        any: Capability,
    ) -> AppResult<()> {
        let author = self.store.author_of(item).await?.ok_or_else(|| {
            AppError::NotFound(format!("{} {} not found", item.item_type, item.item_id))
        })?;

        if author == viewer.uid && viewer.can(own) {
            return Ok(());
        }
        viewer.require(any)
    }
}
