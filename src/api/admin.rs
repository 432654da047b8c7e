/// Admin panel endpoints: roles, bans, user activity and analytics
use crate::{
    admin::{CommunityStats, RoleGrant, RoleManager},
    auth::AuthUser,
    context::AppContext,
    error::AppResult,
    rbac::{Capability, Role},
    require_capability,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_ACTIVITY_LIMIT: i64 = 50;

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/roles", get(list_roles))
        .route("/api/admin/roles/bulk", post(set_roles))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:uid/role", put(set_role))
        .route("/api/admin/users/:uid/ban", post(ban_user))
        .route("/api/admin/users/:uid/unban", post(unban_user))
        .route("/api/admin/users/:uid/activity", get(user_activity))
        .route("/api/admin/stats", get(get_stats))
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: String,
}

#[derive(Deserialize)]
struct BulkRoleRequest {
    uids: Vec<String>,
    role: String,
}

#[derive(Deserialize)]
struct BanRequest {
    reason: Option<String>,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

/// Every role with the capabilities it grants
async fn list_roles(auth: AuthUser) -> AppResult<Json<Vec<RoleGrant>>> {
    require_capability!(auth.viewer, Capability::ManageRoles);
    Ok(Json(RoleManager::role_table()))
}

async fn set_role(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(uid): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let role = Role::from_str(&req.role)?;
    ctx.role_manager.set_role(&auth.viewer, &uid, role).await?;

    Ok(Json(json!({ "uid": uid, "role": role })))
}

/// Apply one role to several users at once
async fn set_roles(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<BulkRoleRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let role = Role::from_str(&req.role)?;
    ctx.role_manager
        .set_roles(&auth.viewer, &req.uids, role)
        .await?;

    Ok(Json(json!({ "updated": req.uids.len(), "role": role })))
}

async fn list_users(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = ctx.config.reports.clamp_limit(query.limit);
    let users = ctx.role_manager.list_users(&auth.viewer, limit).await?;

    Ok(Json(json!({ "users": users })))
}

async fn ban_user(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(uid): Path<String>,
    body: Option<Json<BanRequest>>,
) -> AppResult<Json<serde_json::Value>> {
    let reason = body.and_then(|Json(req)| req.reason);
    ctx.moderation_manager
        .ban(&auth.viewer, &uid, reason.as_deref())
        .await?;

    Ok(Json(json!({ "uid": uid, "banned": true })))
}

async fn unban_user(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.moderation_manager.unban(&auth.viewer, &uid).await?;

    Ok(Json(json!({ "uid": uid, "banned": false })))
}

/// Recent activity for one user
async fn user_activity(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(uid): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<serde_json::Value>> {
    if !auth.viewer.can(Capability::BanUsers) {
        require_capability!(auth.viewer, Capability::AccessAdminPanel);
    }

    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, 500);
    let activity = ctx.activity.for_user(&uid, limit).await?;

    Ok(Json(json!({ "uid": uid, "activity": activity })))
}

async fn get_stats(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> AppResult<Json<CommunityStats>> {
    Ok(Json(ctx.stats.collect(&auth.viewer).await?))
}
