/// Admin and Moderation System
///
/// Role management, bans and community analytics. Every operation takes the
/// acting [`Viewer`](crate::session::Viewer) and checks its capabilities.

pub mod moderation;
pub mod roles;
pub mod stats;

pub use moderation::ModerationManager;
pub use roles::{RoleGrant, RoleManager};
pub use stats::{CommunityStats, StatsService};
