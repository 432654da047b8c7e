/// Agora server binary
use agora::{jobs::JobScheduler, server, AppContext, AppResult, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration first; it picks the log format
    let config = ServerConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agora=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
     _
    / \   __ _  ___  _ __ __ _
   / _ \ / _` |/ _ \| '__/ _` |
  / ___ \ (_| | (_) | | | (_| |
 /_/   \_\__, |\___/|_|  \__,_|
         |___/

        Q&A moderation server v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
