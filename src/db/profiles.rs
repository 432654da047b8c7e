/// Profile store backed by the `users` table
use crate::{
    account::{Profile, ProfileUpdate},
    error::{AppError, AppResult},
    rbac::Role,
    store::ProfileStore,
};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

/// SQLite profile store
#[derive(Clone)]
pub struct SqliteProfileStore {
    db: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Number of profiles per role
    pub async fn count_by_role(&self) -> AppResult<Vec<(Role, i64)>> {
        let rows = sqlx::query("SELECT role, COUNT(*) AS n FROM users GROUP BY role")
            .fetch_all(&self.db)
            .await?;

        let mut counts = Vec::new();
        for row in rows {
            let role_str: String = row.get("role");
            // Unrecognized roles hold no privileges and are not counted as any tier
            if let Some(role) = Role::parse(&role_str) {
                counts.push((role, row.get::<i64, _>("n")));
            }
        }
        Ok(counts)
    }

    /// Insert a profile row on an open connection or transaction
    pub async fn insert_profile(conn: &mut SqliteConnection, profile: &Profile) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (uid, username, email, role, bio, avatar_url, is_banned, reputation, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&profile.uid)
        .bind(&profile.username)
        .bind(&profile.email)
        .bind(profile.role.as_str())
        .bind(&profile.bio)
        .bind(&profile.avatar_url)
        .bind(profile.is_banned)
        .bind(profile.reputation)
        .bind(profile.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    fn parse_profile(row: SqliteRow) -> AppResult<Profile> {
        let role_str: String = row.get("role");
        let uid: String = row.get("uid");
        let role = Role::parse(&role_str).unwrap_or_else(|| {
            tracing::warn!("Unrecognized role {:?} for {}, treating as {}", role_str, uid, Role::User);
            Role::User
        });

        Ok(Profile {
            uid,
            username: row.get("username"),
            email: row.get("email"),
            role,
            bio: row.get("bio"),
            avatar_url: row.get("avatar_url"),
            is_banned: row.get("is_banned"),
            reputation: row.get("reputation"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn get_role(&self, uid: &str) -> AppResult<Option<Role>> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE uid = ?1")
            .bind(uid)
            .fetch_optional(&self.db)
            .await?;

        role.map(|r| Role::from_str(&r)).transpose()
    }

    async fn set_role(&self, uid: &str, role: Role) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET role = ?1 WHERE uid = ?2")
            .bind(role.as_str())
            .bind(uid)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", uid)));
        }

        Ok(())
    }

    async fn set_roles(&self, uids: &[String], role: Role) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for uid in uids {
            let result = sqlx::query("UPDATE users SET role = ?1 WHERE uid = ?2")
                .bind(role.as_str())
                .bind(uid)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the earlier updates
                return Err(AppError::NotFound(format!("User {} not found", uid)));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_profile(&self, profile: &Profile) -> AppResult<()> {
        let mut conn = self.db.acquire().await?;
        Self::insert_profile(&mut conn, profile).await
    }

    async fn get_profile(&self, uid: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT uid, username, email, role, bio, avatar_url, is_banned, reputation, created_at
            FROM users
            WHERE uid = ?1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::parse_profile).transpose()
    }

    async fn update_profile(&self, uid: &str, update: &ProfileUpdate) -> AppResult<()> {
        if update.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE(?1, username),
                bio = COALESCE(?2, bio),
                avatar_url = COALESCE(?3, avatar_url)
            WHERE uid = ?4
            "#,
        )
        .bind(&update.username)
        .bind(&update.bio)
        .bind(&update.avatar_url)
        .bind(uid)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", uid)));
        }

        Ok(())
    }

    async fn set_banned(&self, uid: &str, banned: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET is_banned = ?1 WHERE uid = ?2")
            .bind(banned)
            .bind(uid)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", uid)));
        }

        Ok(())
    }

    async fn is_banned(&self, uid: &str) -> AppResult<bool> {
        let banned: Option<bool> = sqlx::query_scalar("SELECT is_banned FROM users WHERE uid = ?1")
            .bind(uid)
            .fetch_optional(&self.db)
            .await?;

        Ok(banned.unwrap_or(false))
    }

    async fn list_profiles(&self, limit: i64) -> AppResult<Vec<Profile>> {
        let rows = sqlx::query(
            r#"
            SELECT uid, username, email, role, bio, avatar_url, is_banned, reputation, created_at
            FROM users
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::parse_profile).collect()
    }
}
