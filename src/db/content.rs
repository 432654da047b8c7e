/// Question and answer storage
use crate::{
    error::{AppError, AppResult},
    reports::{ContentRef, ItemType},
    store::ContentStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Question record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Answer record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite content store
#[derive(Clone)]
pub struct SqliteContentStore {
    db: SqlitePool,
}

impl SqliteContentStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_question(
        &self,
        author_id: &str,
        title: &str,
        body: &str,
    ) -> AppResult<Question> {
        if title.trim().is_empty() || body.trim().is_empty() {
            return Err(AppError::Validation(
                "Question title and body are required".to_string(),
            ));
        }

        let question = Question {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            title: title.trim().to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO question (id, author_id, title, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&question.id)
        .bind(&question.author_id)
        .bind(&question.title)
        .bind(&question.body)
        .bind(question.created_at)
        .execute(&self.db)
        .await?;

        Ok(question)
    }

    pub async fn create_answer(
        &self,
        question_id: &str,
        author_id: &str,
        body: &str,
    ) -> AppResult<Answer> {
        if body.trim().is_empty() {
            return Err(AppError::Validation("Answer body is required".to_string()));
        }

        if self.get_question(question_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Question {} not found", question_id)));
        }

        let answer = Answer {
            id: Uuid::new_v4().to_string(),
            question_id: question_id.to_string(),
            author_id: author_id.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO answer (id, question_id, author_id, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&answer.id)
        .bind(&answer.question_id)
        .bind(&answer.author_id)
        .bind(&answer.body)
        .bind(answer.created_at)
        .execute(&self.db)
        .await?;

        Ok(answer)
    }

    pub async fn get_question(&self, id: &str) -> AppResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(
            "SELECT id, author_id, title, body, created_at FROM question WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(question)
    }

    pub async fn get_answer(&self, id: &str) -> AppResult<Option<Answer>> {
        let answer = sqlx::query_as::<_, Answer>(
            "SELECT id, question_id, author_id, body, created_at FROM answer WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(answer)
    }

    /// Replace the title and/or body of a question; `None` when it does not exist
    pub async fn update_question(
        &self,
        id: &str,
        title: Option<&str>,
        body: Option<&str>,
    ) -> AppResult<Option<Question>> {
        let title = title.map(str::trim);
        if title == Some("") || body.map(str::trim) == Some("") {
            return Err(AppError::Validation(
                "Question title and body cannot be empty".to_string(),
            ));
        }

        let question = sqlx::query_as::<_, Question>(
            r#"
            UPDATE question
            SET title = COALESCE(?1, title),
                body = COALESCE(?2, body)
            WHERE id = ?3
            RETURNING id, author_id, title, body, created_at
            "#,
        )
        .bind(title)
        .bind(body)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(question)
    }

    /// Replace the body of an answer; `None` when it does not exist
    pub async fn update_answer(&self, id: &str, body: &str) -> AppResult<Option<Answer>> {
        if body.trim().is_empty() {
            return Err(AppError::Validation("Answer body is required".to_string()));
        }

        let answer = sqlx::query_as::<_, Answer>(
            r#"
            UPDATE answer
            SET body = ?1
            WHERE id = ?2
            RETURNING id, question_id, author_id, body, created_at
            "#,
        )
        .bind(body)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(answer)
    }

    /// Total (questions, answers)
    pub async fn totals(&self) -> AppResult<(i64, i64)> {
        let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM question")
            .fetch_one(&self.db)
            .await?;
        let answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answer")
            .fetch_one(&self.db)
            .await?;

        Ok((questions, answers))
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn author_of(&self, item: &ContentRef) -> AppResult<Option<String>> {
        let sql = match item.item_type {
            ItemType::Question => "SELECT author_id FROM question WHERE id = ?1",
            ItemType::Answer => "SELECT author_id FROM answer WHERE id = ?1",
        };

        let author: Option<String> = sqlx::query_scalar(sql)
            .bind(&item.item_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(author)
    }

    async fn delete(&self, item: &ContentRef) -> AppResult<Option<Vec<String>>> {
        let mut tx = self.db.begin().await?;

        // Answers are deleted in the same transaction, so none can slip in unseen
        let answer_ids: Vec<String> = match item.item_type {
            ItemType::Question => {
                sqlx::query_scalar("DELETE FROM answer WHERE question_id = ?1 RETURNING id")
                    .bind(&item.item_id)
                    .fetch_all(&mut *tx)
                    .await?
            }
            ItemType::Answer => Vec::new(),
        };

        let sql = match item.item_type {
            ItemType::Question => "DELETE FROM question WHERE id = ?1",
            ItemType::Answer => "DELETE FROM answer WHERE id = ?1",
        };
        let result = sqlx::query(sql).bind(&item.item_id).execute(&mut *tx).await?;

        if result.rows_affected() == 0 {
            // Nothing to delete; dropping the transaction rolls back
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(answer_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn test_delete_question_cascades_to_answers() {
        let store = SqliteContentStore::new(memory_pool().await.unwrap());

        let question = store
            .create_question("alice", "Lifetimes?", "Why does this not compile")
            .await
            .unwrap();
        let answer = store
            .create_answer(&question.id, "bob", "Add a lifetime parameter")
            .await
            .unwrap();

        assert_eq!(
            store
                .author_of(&ContentRef::answer(&answer.id))
                .await
                .unwrap()
                .as_deref(),
            Some("bob")
        );

        let removed = store.delete(&ContentRef::question(&question.id)).await.unwrap();
        assert_eq!(removed, Some(vec![answer.id.clone()]));
        assert!(store.get_answer(&answer.id).await.unwrap().is_none());
        assert_eq!(store.delete(&ContentRef::question(&question.id)).await.unwrap(), None);
        assert_eq!(store.delete(&ContentRef::answer(&answer.id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_answer_requires_question() {
        let store = SqliteContentStore::new(memory_pool().await.unwrap());

        let result = store.create_answer("missing", "bob", "hello").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
