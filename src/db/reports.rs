/// Report store backed by the `report` table
use crate::{
    error::AppResult,
    reports::{ContentRef, ItemType, Report, ReportReason, ReportStatus, StatusFilter},
    store::ReportStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const REPORT_COLUMNS: &str = "id, item_id, item_type, reporter_id, reporter_name, reason, details, \
                              content_preview, status, created_at, resolved_at, resolved_by";

/// SQLite report store
#[derive(Clone)]
pub struct SqliteReportStore {
    db: SqlitePool,
}

impl SqliteReportStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn parse_report(row: SqliteRow) -> AppResult<Report> {
        let item_type_str: String = row.get("item_type");
        let reason_str: String = row.get("reason");
        let status_str: String = row.get("status");

        Ok(Report {
            id: row.get("id"),
            item_id: row.get("item_id"),
            item_type: ItemType::from_str(&item_type_str)?,
            reporter_id: row.get("reporter_id"),
            reporter_name: row.get("reporter_name"),
            reason: ReportReason::from_str(&reason_str)?,
            details: row.get("details"),
            content_preview: row.get("content_preview"),
            status: ReportStatus::from_str(&status_str)?,
            created_at: row.get("created_at"),
            resolved_at: row.get("resolved_at"),
            resolved_by: row.get("resolved_by"),
        })
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn insert(&self, report: &Report) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO report (id, item_id, item_type, reporter_id, reporter_name, reason, details,
                                content_preview, status, created_at, resolved_at, resolved_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&report.id)
        .bind(&report.item_id)
        .bind(report.item_type.as_str())
        .bind(&report.reporter_id)
        .bind(&report.reporter_name)
        .bind(report.reason.as_str())
        .bind(&report.details)
        .bind(&report.content_preview)
        .bind(report.status.as_str())
        .bind(report.created_at)
        .bind(report.resolved_at)
        .bind(&report.resolved_by)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> AppResult<Option<Report>> {
        let row = sqlx::query(&format!("SELECT {} FROM report WHERE id = ?1", REPORT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(Self::parse_report).transpose()
    }

    async fn list(&self, filter: StatusFilter, limit: i64) -> AppResult<Vec<Report>> {
        let rows = match filter {
            StatusFilter::Only(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM report WHERE status = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    REPORT_COLUMNS
                ))
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
            StatusFilter::All => {
                sqlx::query(&format!(
                    "SELECT {} FROM report ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                    REPORT_COLUMNS
                ))
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.into_iter().map(Self::parse_report).collect()
    }

    async fn transition(
        &self,
        id: &str,
        status: ReportStatus,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        // The status guard makes terminal states sticky even under concurrent writers
        let result = sqlx::query(
            r#"
            UPDATE report
            SET status = ?1,
                resolved_at = ?2,
                resolved_by = ?3
            WHERE id = ?4 AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(resolved_at)
        .bind(resolved_by)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_for_item(&self, item: &ContentRef, keep: Option<&str>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM report
            WHERE item_type = ?1 AND item_id = ?2 AND (?3 IS NULL OR id <> ?3)
            "#,
        )
        .bind(item.item_type.as_str())
        .bind(&item.item_id)
        .bind(keep)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_by_status(&self) -> AppResult<Vec<(ReportStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM report GROUP BY status")
            .fetch_all(&self.db)
            .await?;

        let mut counts = Vec::new();
        for row in rows {
            let status_str: String = row.get("status");
            counts.push((ReportStatus::from_str(&status_str)?, row.get::<i64, _>("n")));
        }
        Ok(counts)
    }
}
