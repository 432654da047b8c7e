use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::{context::AppContext, db};

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_credentials_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Delete expired sessions and spent reset tokens (runs every hour)
    async fn expired_credentials_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            info!("Running expired credential cleanup");

            match scheduler.context.account_manager.cleanup_expired().await {
                Ok((sessions, resets)) => {
                    if sessions + resets > 0 {
                        info!("Cleaned up {} sessions and {} reset tokens", sessions, resets);
                    }
                }
                Err(e) => error!("Failed to clean up expired credentials: {}", e),
            }
        }
    }

    /// Database and live feed check (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = db::test_connection(&scheduler.context.db).await {
                error!("Health check failed: {}", e);
                continue;
            }

            tracing::debug!(
                "Health check ok, {} live report subscribers",
                scheduler.context.reports.feed().subscriber_count()
            );
        }
    }
}
