/// Report endpoints and the live moderation feed
use crate::{
    auth::AuthUser,
    context::AppContext,
    db::ActivityType,
    error::AppResult,
    reports::{
        ContentRef, ItemType, Report, ReportDraft, ReportReason, ReportSubscription, StatusFilter,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

/// Build report routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/reports", post(create_report).get(list_reports))
        .route("/api/reports/live", get(live_reports))
        .route("/api/reports/:id/resolve", post(resolve_report))
        .route("/api/reports/:id/dismiss", post(dismiss_report))
        .route("/api/reports/:id/remove", post(remove_content))
        .route("/api/reports/:id/retry-removal", post(retry_removal))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportRequest {
    item_type: String,
    item_id: String,
    reason: Option<String>,
    #[serde(default)]
    details: String,
    content_preview: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListReportsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

impl ListReportsQuery {
    fn filter(&self) -> AppResult<StatusFilter> {
        match self.status.as_deref() {
            Some(status) => StatusFilter::parse(status),
            None => Ok(StatusFilter::All),
        }
    }
}

/// File a report against a question or answer
async fn create_report(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<CreateReportRequest>,
) -> AppResult<Json<Report>> {
    let item = ContentRef {
        item_type: ItemType::from_str(&req.item_type)?,
        item_id: req.item_id,
    };
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(ReportReason::from_str)
        .transpose()?;

    let report = ctx
        .reports
        .create(
            &auth.viewer,
            ReportDraft {
                item,
                reason,
                details: req.details,
                content_preview: req.content_preview,
            },
        )
        .await?;

    ctx.activity
        .record(
            &auth.viewer.uid,
            ActivityType::ReportCreate,
            Some(report.id.as_str()),
            Some(report.item_id.as_str()),
        )
        .await;

    Ok(Json(report))
}

async fn list_reports(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<ListReportsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let filter = query.filter()?;
    let limit = ctx.config.reports.clamp_limit(query.limit);

    let reports = ctx.reports.list(&auth.viewer, filter, limit).await?;

    Ok(Json(json!({ "reports": reports })))
}

async fn resolve_report(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Report>> {
    let report = ctx.reports.resolve(&auth.viewer, &id).await?;
    ctx.activity
        .record(&auth.viewer.uid, ActivityType::ReportResolve, Some(id.as_str()), None)
        .await;
    Ok(Json(report))
}

async fn dismiss_report(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Report>> {
    let report = ctx.reports.dismiss(&auth.viewer, &id).await?;
    ctx.activity
        .record(&auth.viewer.uid, ActivityType::ReportDismiss, Some(id.as_str()), None)
        .await;
    Ok(Json(report))
}

/// Mark the report removed and delete the reported content
async fn remove_content(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Report>> {
    let report = ctx.reports.remove(&auth.viewer, &id).await?;
    ctx.activity
        .record(
            &auth.viewer.uid,
            ActivityType::ReportRemove,
            Some(id.as_str()),
            Some(report.item_id.as_str()),
        )
        .await;
    Ok(Json(report))
}

/// Retry the deletion for a report already marked removed
async fn retry_removal(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Report>> {
    let report = ctx.reports.retry_content_removal(&auth.viewer, &id).await?;
    ctx.activity
        .record(&auth.viewer.uid, ActivityType::ReportRemove, Some(id.as_str()), Some("retry"))
        .await;
    Ok(Json(report))
}

/// Live report listing over WebSocket.
///
/// Each frame is `{"type": "snapshot", "reports": [...]}` holding the full
/// filtered listing. The first frame is sent right after the upgrade.
async fn live_reports(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<ListReportsQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let filter = query.filter()?;
    let limit = ctx.config.reports.clamp_limit(query.limit);

    // Checked before the upgrade so members get a plain 403
    let subscription = ctx.reports.subscribe(&auth.viewer, filter, limit)?;
    tracing::info!("{} subscribed to live reports", auth.viewer.uid);

    Ok(ws.on_upgrade(move |socket| stream_reports(socket, subscription)))
}

async fn stream_reports(socket: WebSocket, mut subscription: ReportSubscription) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            snapshot = subscription.next_snapshot() => match snapshot {
                Ok(Some(reports)) => {
                    let frame = json!({ "type": "snapshot", "reports": reports });
                    if sender.send(Message::Text(frame.to_string())).await.is_err() {
                        tracing::debug!("Live report client went away");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Live report snapshot failed: {}", e);
                    let frame = json!({ "type": "error", "message": e.to_string() });
                    let _ = sender.send(Message::Text(frame.to_string())).await;
                    break;
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Live report socket error: {}", e);
                    break;
                }
            },
        }
    }

    subscription.unsubscribe();
    let _ = sender.send(Message::Close(None)).await;
}
