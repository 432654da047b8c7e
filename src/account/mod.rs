/// Account management system
///
/// Handles sign-up, sign-in, sessions, password resets and profile records.

mod manager;
mod provider;

pub use manager::{account_identity, AccountManager};
pub use provider::LocalAuthProvider;

use crate::rbac::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated identity as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Community profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub bio: String,
    pub avatar_url: String,
    pub is_banned: bool,
    pub reputation: i64,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// New profile with the lowest role
    pub fn new(uid: &str, username: &str, email: &str) -> Self {
        Self {
            uid: uid.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            role: Role::User,
            bio: String::new(),
            avatar_url: String::new(),
            is_banned: false,
            reputation: 0,
            created_at: Utc::now(),
        }
    }
}

/// Partial profile update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.bio.is_none() && self.avatar_url.is_none()
    }
}

/// Sign-up request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

/// Sign-in request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Session response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub access_jwt: String,
    pub expires_at: DateTime<Utc>,
}

/// Password reset request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

/// Password reset confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Password change for a signed-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Issued session with its bearer token
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: String,
    pub identity: Identity,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedSession> for SessionResponse {
    fn from(issued: IssuedSession) -> Self {
        Self {
            uid: issued.identity.uid,
            email: issued.identity.email,
            display_name: issued.identity.display_name,
            access_jwt: issued.access_token,
            expires_at: issued.expires_at,
        }
    }
}

/// Validated session from bearer token
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub uid: String,
    pub session_id: String,
}
