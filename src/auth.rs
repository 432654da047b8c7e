/// Authentication extractors and utilities
use crate::{
    account::ValidatedSession,
    context::AppContext,
    error::AppError,
    session::{resolve_role, Viewer},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Authenticated user with a resolved role.
///
/// Rejects missing or invalid tokens with 401 and banned accounts with 403.
/// The role is read on every request and falls back to the lowest tier.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub viewer: Viewer,
    pub session: ValidatedSession,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Extract bearer token from Authorization header
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        authenticate(state, &token).await
    }
}

/// Optional authenticated user - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthUser {
    pub auth: Option<AuthUser>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = match extract_bearer_token(&parts.headers) {
            Some(token) => match authenticate(state, &token).await {
                Ok(auth) => Some(auth),
                // A banned user is still signed in; surface it
                Err(e @ AppError::AccountBanned(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!("Ignoring invalid bearer token: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(OptionalAuthUser { auth })
    }
}

async fn authenticate(state: &AppContext, token: &str) -> Result<AuthUser, AppError> {
    let session = state.account_manager.validate_access_token(token).await?;

    if state.moderation_manager.is_banned(&session.uid).await? {
        tracing::debug!("Rejecting request from banned account {}", session.uid);
        return Err(AppError::AccountBanned(
            "This account has been banned".to_string(),
        ));
    }

    let role = resolve_role(state.profiles.as_ref(), &session.uid).await;
    let account = state.account_manager.get_account(&session.uid).await?;

    Ok(AuthUser {
        viewer: Viewer::new(session.uid.clone(), account.display_name, role),
        session,
    })
}
