/// Agora - role-based access control and report moderation for a Q&A community
///
/// Roles grant named capabilities. A session context follows the signed-in
/// identity and resolves its role; route and render guards decide what the
/// session may see; the report lifecycle moves member reports through
/// moderation and removes offending content.

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod error;
pub mod guard;
pub mod jobs;
pub mod mailer;
pub mod metrics;
pub mod rbac;
pub mod reports;
pub mod server;
pub mod session;
pub mod store;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AppError, AppResult};
