/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::{ModerationManager, RoleManager, StatsService},
    config::ServerConfig,
    content::ContentService,
    db::{self, ActivityLog, SqliteContentStore, SqliteProfileStore, SqliteReportStore},
    error::{AppError, AppResult},
    guard::RouteTable,
    mailer::Mailer,
    reports::{ReportFeed, ReportLifecycle},
    store::{ContentStore, ProfileStore, ReportStore},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub profiles: Arc<dyn ProfileStore>,
    // Moderation
    pub reports: Arc<ReportLifecycle>,
    pub content: Arc<ContentService>,
    pub role_manager: Arc<RoleManager>,
    pub moderation_manager: Arc<ModerationManager>,
    pub stats: Arc<StatsService>,
    pub activity: ActivityLog,
    // Client navigation map
    pub routes: Arc<RouteTable>,
    // Email mailer
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directory if it doesn't exist
        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory)
                .await
                .map_err(|e| {
                    AppError::Internal(format!(
                        "Failed to create directory {:?}: {}",
                        config.storage.data_directory, e
                    ))
                })?;
        }

        let db = db::create_pool(
            &config.storage.database,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        Self::from_pool(config, db)
    }

    /// Wire every service over an already migrated pool
    pub fn from_pool(config: ServerConfig, db: SqlitePool) -> AppResult<Self> {
        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        let config = Arc::new(config);

        let account_manager = Arc::new(AccountManager::new(db.clone(), config.clone()));
        let activity = ActivityLog::new(db.clone());

        let profile_store = SqliteProfileStore::new(db.clone());
        let content_store = SqliteContentStore::new(db.clone());
        let profiles: Arc<dyn ProfileStore> = Arc::new(profile_store.clone());
        let report_store: Arc<dyn ReportStore> = Arc::new(SqliteReportStore::new(db.clone()));
        let content_dyn: Arc<dyn ContentStore> = Arc::new(content_store.clone());

        let lifecycle = ReportLifecycle::new(
            report_store.clone(),
            content_dyn,
            ReportFeed::new(config.reports.feed_capacity),
        );

        let content = Arc::new(ContentService::new(
            content_store.clone(),
            lifecycle.clone(),
            activity.clone(),
        ));
        let role_manager = Arc::new(RoleManager::new(profiles.clone(), activity.clone()));
        let moderation_manager = Arc::new(ModerationManager::new(profiles.clone(), activity.clone()));
        let stats = Arc::new(StatsService::new(profile_store, report_store, content_store));

        Ok(Self {
            config,
            db,
            account_manager,
            profiles,
            reports: Arc::new(lifecycle),
            content,
            role_manager,
            moderation_manager,
            stats,
            activity,
            routes: Arc::new(RouteTable::default()),
            mailer,
        })
    }

    /// Public base URL used in emailed links
    pub fn public_url(&self) -> &str {
        self.config.service.public_url.trim_end_matches('/')
    }
}
