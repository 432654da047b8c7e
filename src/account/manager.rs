/// Account manager implementation using runtime queries
use crate::{
    account::{Identity, IssuedSession, Profile, ProfileUpdate, ValidatedSession},
    config::ServerConfig,
    db::{
        account::{Account, PasswordResetRecord, SessionRecord},
        SqliteProfileStore,
    },
    error::{AppError, AppResult},
    metrics,
    rbac::Role,
    store::ProfileStore,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

/// Access token claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    sid: String,
    iat: i64,
    exp: i64,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    profiles: SqliteProfileStore,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        let profiles = SqliteProfileStore::new(db.clone());
        Self {
            db,
            config,
            profiles,
        }
    }

    /// Create an account and its community profile, then open a session
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> AppResult<(Account, IssuedSession)> {
        let email = email.trim().to_lowercase();
        let username = username.trim();

        Self::validate_email(&email)?;
        Self::validate_password(password)?;
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }

        if self.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let account = Account {
            uid: Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash,
            display_name: Some(username.to_string()),
            created_at: Utc::now(),
        };

        let mut profile = Profile::new(&account.uid, username, &email);
        if self.config.is_bootstrap_admin(&email) {
            tracing::info!("Granting admin role to bootstrap account {}", email);
            profile.role = Role::Admin;
        }

        // Account and profile land together or not at all
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO account (uid, email, password_hash, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&account.uid)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.display_name)
        .bind(account.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email already registered".to_string())
            }
            e => AppError::Database(e),
        })?;

        SqliteProfileStore::insert_profile(&mut *tx, &profile).await?;
        tx.commit().await?;
        metrics::record_account_creation();

        let session = self.create_session(&account).await?;
        Ok((account, session))
    }

    /// Authenticate with email and password and open a session
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<(Account, IssuedSession)> {
        let account = self
            .get_account_by_email(&email.trim().to_lowercase())
            .await
            .map_err(|_| AppError::Authentication("Invalid credentials".to_string()))?;

        if !verify_password(password, &account.password_hash)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let session = self.create_session(&account).await?;
        Ok((account, session))
    }

    /// Create a session for an account
    pub async fn create_session(&self, account: &Account) -> AppResult<IssuedSession> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.authentication.session_ttl_secs);

        let access_token = self.generate_access_token(&account.uid, &session_id, now, expires_at)?;

        sqlx::query(
            "INSERT INTO session (id, uid, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&session_id)
        .bind(&account.uid)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(IssuedSession {
            session_id,
            identity: account_identity(account),
            access_token,
            expires_at,
        })
    }

    /// Validate access token and return session info
    pub async fn validate_access_token(&self, token: &str) -> AppResult<ValidatedSession> {
        let decoding_key = DecodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!("JWT verification failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::Authentication("Token has expired".to_string())
                    }
                    _ => AppError::Authentication("Invalid token".to_string()),
                }
            })?
            .claims;

        // A signed token is only valid while its session row exists
        let session = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, uid, created_at, expires_at FROM session WHERE id = ?1",
        )
        .bind(&claims.sid)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Authentication("Session has ended".to_string()))?;

        if session.uid != claims.sub || Utc::now() > session.expires_at {
            return Err(AppError::Authentication("Session expired".to_string()));
        }

        Ok(ValidatedSession {
            uid: session.uid,
            session_id: session.id,
        })
    }

    /// Expiry of an open session
    pub async fn session_expiry(&self, session_id: &str) -> AppResult<DateTime<Utc>> {
        sqlx::query_scalar("SELECT expires_at FROM session WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::Authentication("Session has ended".to_string()))
    }

    /// Delete a session (sign out)
    pub async fn sign_out(&self, session_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM session WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Get account by uid
    pub async fn get_account(&self, uid: &str) -> AppResult<Account> {
        sqlx::query_as::<_, Account>(
            "SELECT uid, email, password_hash, display_name, created_at FROM account WHERE uid = ?1",
        )
        .bind(uid)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    /// Get account by email
    pub async fn get_account_by_email(&self, email: &str) -> AppResult<Account> {
        sqlx::query_as::<_, Account>(
            "SELECT uid, email, password_hash, display_name, created_at FROM account WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    /// Update the display name on the account and the profile username
    pub async fn update_display_name(&self, uid: &str, display_name: &str) -> AppResult<()> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }

        sqlx::query("UPDATE account SET display_name = ?1 WHERE uid = ?2")
            .bind(display_name)
            .bind(uid)
            .execute(&self.db)
            .await?;

        self.profiles
            .update_profile(
                uid,
                &ProfileUpdate {
                    username: Some(display_name.to_string()),
                    ..Default::default()
                },
            )
            .await
    }

    /// Change password after verifying the current one
    pub async fn change_password(
        &self,
        uid: &str,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let account = self.get_account(uid).await?;

        if !verify_password(current_password, &account.password_hash)? {
            return Err(AppError::Authentication("Invalid current password".to_string()));
        }

        Self::validate_password(new_password)?;
        self.store_password(uid, new_password).await
    }

    /// Generate a one-time password reset token.
    ///
    /// Returns `None` for unknown emails so callers cannot probe for accounts.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<Option<(Account, String)>> {
        let account = match self.get_account_by_email(&email.trim().to_lowercase()).await {
            Ok(account) => account,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.authentication.reset_token_ttl_secs);

        sqlx::query(
            "INSERT INTO password_reset (token_hash, uid, created_at, expires_at, used)
             VALUES (?1, ?2, ?3, ?4, 0)",
        )
        .bind(digest_token(&token))
        .bind(&account.uid)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(Some((account, token)))
    }

    /// Consume a reset token and set a new password. All sessions are closed.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        Self::validate_password(new_password)?;

        let reset = sqlx::query_as::<_, PasswordResetRecord>(
            "SELECT token_hash, uid, created_at, expires_at, used FROM password_reset WHERE token_hash = ?1",
        )
        .bind(digest_token(token))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid reset token".to_string()))?;

        if reset.used {
            return Err(AppError::Validation("Reset token already used".to_string()));
        }
        if Utc::now() > reset.expires_at {
            return Err(AppError::Validation("Reset token expired".to_string()));
        }

        // Claim the token first so two concurrent resets cannot both use it
        let claimed = sqlx::query("UPDATE password_reset SET used = 1 WHERE token_hash = ?1 AND used = 0")
            .bind(&reset.token_hash)
            .execute(&self.db)
            .await?;
        if claimed.rows_affected() == 0 {
            return Err(AppError::Validation("Reset token already used".to_string()));
        }

        self.store_password(&reset.uid, new_password).await?;

        sqlx::query("DELETE FROM session WHERE uid = ?1")
            .bind(&reset.uid)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Remove expired sessions and reset tokens
    pub async fn cleanup_expired(&self) -> AppResult<(u64, u64)> {
        let now = Utc::now();

        let sessions = sqlx::query("DELETE FROM session WHERE expires_at < ?1")
            .bind(now)
            .execute(&self.db)
            .await?
            .rows_affected();

        let resets = sqlx::query("DELETE FROM password_reset WHERE expires_at < ?1 OR used = 1")
            .bind(now)
            .execute(&self.db)
            .await?
            .rows_affected();

        Ok((sessions, resets))
    }

    async fn store_password(&self, uid: &str, password: &str) -> AppResult<()> {
        let password_hash = hash_password(password)?;

        let result = sqlx::query("UPDATE account SET password_hash = ?1 WHERE uid = ?2")
            .bind(&password_hash)
            .bind(uid)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Account not found".to_string()));
        }

        Ok(())
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    fn generate_access_token(
        &self,
        uid: &str,
        session_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<String> {
        let claims = Claims {
            sub: uid.to_string(),
            sid: session_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Jwt(format!("Failed to sign token: {}", e)))
    }

    fn validate_email(email: &str) -> AppResult<()> {
        let valid = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);

        if !valid {
            return Err(AppError::Validation(format!("Invalid email: {}", email)));
        }
        Ok(())
    }

    fn validate_password(password: &str) -> AppResult<()> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Identity view of an account
pub fn account_identity(account: &Account) -> Identity {
    Identity {
        uid: account.uid.clone(),
        email: account.email.clone(),
        display_name: account.display_name.clone(),
    }
}

/// Hash a password with Argon2id
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
    }
}

/// 32 random alphanumeric characters
fn generate_token() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    (0..32)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
