/// Account, session and profile endpoints
use crate::{
    account::{
        ChangePasswordRequest, Profile, ProfileUpdate, RequestPasswordResetRequest,
        ResetPasswordRequest, SessionResponse, SignInRequest, SignUpRequest,
    },
    auth::AuthUser,
    context::AppContext,
    db::ActivityType,
    error::{AppError, AppResult},
    rbac::capabilities_of,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/login", post(sign_in))
        .route("/api/auth/logout", post(sign_out))
        .route("/api/auth/reset-password/request", post(request_password_reset))
        .route("/api/auth/reset-password/confirm", post(reset_password))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/session", get(get_session))
        .route("/api/profile", get(get_profile).put(update_profile))
}

/// Create an account and sign in
async fn sign_up(
    State(ctx): State<AppContext>,
    Json(req): Json<SignUpRequest>,
) -> AppResult<Json<SessionResponse>> {
    tracing::info!("sign_up: creating account for {}", req.email);

    let (account, issued) = ctx
        .account_manager
        .sign_up(&req.email, &req.password, &req.username)
        .await?;

    ctx.activity
        .record(&account.uid, ActivityType::UserSignup, None, None)
        .await;

    Ok(Json(issued.into()))
}

async fn sign_in(
    State(ctx): State<AppContext>,
    Json(req): Json<SignInRequest>,
) -> AppResult<Json<SessionResponse>> {
    let (account, issued) = ctx
        .account_manager
        .sign_in(&req.email, &req.password)
        .await?;

    ctx.activity
        .record(&account.uid, ActivityType::UserLogin, None, None)
        .await;

    Ok(Json(issued.into()))
}

/// Close the session behind the bearer token
async fn sign_out(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    ctx.account_manager
        .sign_out(&auth.session.session_id)
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// Email a reset link. Unknown addresses get the same response.
async fn request_password_reset(
    State(ctx): State<AppContext>,
    Json(req): Json<RequestPasswordResetRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if let Some((account, token)) = ctx.account_manager.request_password_reset(&req.email).await? {
        let name = account.display_name.as_deref().unwrap_or(&account.email);
        ctx.mailer
            .send_password_reset_email(&account.email, name, &token, ctx.public_url())
            .await
            .map_err(|e| {
                tracing::error!("Failed to send password reset email to {}: {}", account.email, e);
                e
            })?;
    } else {
        tracing::debug!("Password reset requested for unknown email");
    }

    Ok(Json(json!({ "success": true })))
}

async fn reset_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.account_manager
        .reset_password(&req.token, &req.new_password)
        .await?;

    Ok(Json(json!({ "success": true })))
}

async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.account_manager
        .change_password(&auth.viewer.uid, &req.current_password, &req.new_password)
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// Signed-in identity with its role and granted capabilities
async fn get_session(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let account = ctx.account_manager.get_account(&auth.viewer.uid).await?;
    let expires_at = ctx
        .account_manager
        .session_expiry(&auth.session.session_id)
        .await?;

    Ok(Json(json!({
        "uid": account.uid,
        "email": account.email,
        "displayName": account.display_name,
        "role": auth.viewer.role,
        "capabilities": capabilities_of(auth.viewer.role),
        "expiresAt": expires_at,
    })))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> AppResult<Json<Profile>> {
    let profile = ctx
        .profiles
        .get_profile(&auth.viewer.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}

/// Partial profile update. A new username also becomes the display name.
async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<Profile>> {
    if update.is_empty() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    let uid = &auth.viewer.uid;
    if let Some(username) = &update.username {
        ctx.account_manager.update_display_name(uid, username).await?;
    }

    let rest = ProfileUpdate {
        username: None,
        ..update
    };
    if !rest.is_empty() {
        ctx.profiles.update_profile(uid, &rest).await?;
    }

    ctx.activity
        .record(uid, ActivityType::UserUpdateProfile, None, None)
        .await;

    get_profile(State(ctx), auth).await
}
