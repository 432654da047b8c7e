/// API routes and handlers
pub mod account;
pub mod admin;
pub mod content;
pub mod middleware;
pub mod navigation;
pub mod reports;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(account::routes())
        .merge(content::routes())
        .merge(reports::routes())
        .merge(admin::routes())
        .merge(navigation::routes())
}
