/// Activity log
///
/// Append-only record of member and moderator actions. Writes never fail the
/// calling operation; errors are logged and dropped.
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Activity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    QuestionCreate,
    QuestionUpdate,
    QuestionDelete,
    AnswerCreate,
    AnswerUpdate,
    AnswerDelete,
    UserLogin,
    UserSignup,
    UserUpdateProfile,
    ReportCreate,
    ReportResolve,
    ReportDismiss,
    ReportRemove,
    RoleChange,
    UserBan,
    UserUnban,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::QuestionCreate => "question_create",
            ActivityType::QuestionUpdate => "question_update",
            ActivityType::QuestionDelete => "question_delete",
            ActivityType::AnswerCreate => "answer_create",
            ActivityType::AnswerUpdate => "answer_update",
            ActivityType::AnswerDelete => "answer_delete",
            ActivityType::UserLogin => "user_login",
            ActivityType::UserSignup => "user_signup",
            ActivityType::UserUpdateProfile => "user_update_profile",
            ActivityType::ReportCreate => "report_create",
            ActivityType::ReportResolve => "report_resolve",
            ActivityType::ReportDismiss => "report_dismiss",
            ActivityType::ReportRemove => "report_remove",
            ActivityType::RoleChange => "role_change",
            ActivityType::UserBan => "user_ban",
            ActivityType::UserUnban => "user_unban",
        }
    }
}

/// Activity log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: String,
    pub activity_type: String,
    pub subject_id: Option<String>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Activity logger
#[derive(Clone)]
pub struct ActivityLog {
    db: SqlitePool,
}

impl ActivityLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record an activity, logging instead of failing on error
    pub async fn record(
        &self,
        user_id: &str,
        activity: ActivityType,
        subject_id: Option<&str>,
        details: Option<&str>,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO activity_log (user_id, activity_type, subject_id, details, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(user_id)
        .bind(activity.as_str())
        .bind(subject_id)
        .bind(details)
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        if let Err(e) = result {
            tracing::error!("Error logging activity {}: {}", activity.as_str(), e);
        }
    }

    /// Most recent activity for a user
    pub async fn for_user(&self, user_id: &str, limit: i64) -> AppResult<Vec<ActivityEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, activity_type, subject_id, details, timestamp
            FROM activity_log
            WHERE user_id = ?1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ActivityEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                activity_type: row.get("activity_type"),
                subject_id: row.get("subject_id"),
                details: row.get("details"),
                timestamp: row.get("timestamp"),
            })
            .collect())
    }
}
