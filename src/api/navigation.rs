/// Navigation guard endpoints
///
/// Lets a client ask where a path leads for the current session, and whether
/// a guarded component should render.
use crate::{
    account::account_identity,
    auth::OptionalAuthUser,
    context::AppContext,
    error::{AppError, AppResult},
    guard::{evaluate_render, RouteEntry, Requirement, Visibility},
    rbac::{Capability, Role},
    session::SessionState,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Build navigation routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/navigation", get(navigate))
        .route("/api/navigation/routes", get(list_routes))
        .route("/api/navigation/visibility", get(visibility))
}

#[derive(Deserialize)]
struct NavigateQuery {
    path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisibilityQuery {
    min_role: Option<String>,
    capability: Option<String>,
}

/// Session state as seen by a single request. Requests are never mid-load.
async fn session_state(ctx: &AppContext, user: OptionalAuthUser) -> AppResult<SessionState> {
    let Some(auth) = user.auth else {
        return Ok(SessionState::SignedOut);
    };

    let account = ctx.account_manager.get_account(&auth.viewer.uid).await?;
    Ok(SessionState::Ready {
        identity: account_identity(&account),
        role: auth.viewer.role,
    })
}

/// Route guard decision for a path
async fn navigate(
    State(ctx): State<AppContext>,
    user: OptionalAuthUser,
    Query(query): Query<NavigateQuery>,
) -> AppResult<Json<serde_json::Value>> {
    if !query.path.starts_with('/') {
        return Err(AppError::Validation("Path must start with '/'".to_string()));
    }

    let state = session_state(&ctx, user).await?;
    let decision = ctx.routes.decide(&state, &query.path);

    // Flat body: {"decision": ..., "returnTo"?: ..., "location": ..., "path": ...}
    let mut body = serde_json::to_value(&decision)
        .map_err(|e| AppError::Internal(format!("Failed to encode route decision: {}", e)))?;
    body["location"] = json!(decision.location());
    body["path"] = json!(query.path);

    Ok(Json(body))
}

async fn list_routes(State(ctx): State<AppContext>) -> Json<Vec<RouteEntry>> {
    Json(ctx.routes.entries().to_vec())
}

/// Render guard outcome for a role and/or capability requirement
async fn visibility(
    State(ctx): State<AppContext>,
    user: OptionalAuthUser,
    Query(query): Query<VisibilityQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let mut requirement = Requirement::default();
    if let Some(role) = query.min_role.as_deref() {
        requirement.min_role = Some(Role::from_str(role)?);
    }
    if let Some(name) = query.capability.as_deref() {
        // Nobody holds a capability that is not in the table
        let Some(capability) = Capability::parse(name) else {
            tracing::debug!("Unknown capability {} requested, hiding", name);
            return Ok(Json(json!({ "visibility": Visibility::Hidden })));
        };
        requirement = requirement.with_capability(capability);
    }

    let state = session_state(&ctx, user).await?;

    Ok(Json(json!({ "visibility": evaluate_render(&state, &requirement) })))
}
