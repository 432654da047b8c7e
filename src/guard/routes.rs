/// Client navigation map
use super::{evaluate_route, Requirement, RouteDecision};
use crate::{
    rbac::{Capability, Role},
    session::SessionState,
};
use serde::Serialize;

/// A guarded path prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub path: String,
    /// `None` for public pages
    pub requirement: Option<Requirement>,
}

impl RouteEntry {
    pub fn public(path: &str) -> Self {
        Self {
            path: path.to_string(),
            requirement: None,
        }
    }

    pub fn guarded(path: &str, requirement: Requirement) -> Self {
        Self {
            path: path.to_string(),
            requirement: Some(requirement),
        }
    }

    fn matches(&self, path: &str) -> bool {
        if self.path == "/" {
            return path == "/";
        }
        path == self.path
            || path
                .strip_prefix(self.path.as_str())
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    }
}

/// Route table. The longest matching prefix wins; unknown paths are public.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            RouteEntry::public("/"),
            RouteEntry::public("/login"),
            RouteEntry::public("/signup"),
            RouteEntry::public("/reset-password"),
            RouteEntry::public("/questions"),
            RouteEntry::guarded("/ask", Requirement::capability(Capability::CreateContent)),
            RouteEntry::guarded("/profile", Requirement::signed_in()),
            RouteEntry::guarded("/admin", Requirement::role(Role::Moderator)),
            RouteEntry::guarded(
                "/admin/reports",
                Requirement::role(Role::Moderator).with_capability(Capability::HandleReports),
            ),
            RouteEntry::guarded(
                "/admin/users",
                Requirement::role(Role::Moderator).with_capability(Capability::BanUsers),
            ),
            RouteEntry::guarded(
                "/admin/roles",
                Requirement::role(Role::Admin).with_capability(Capability::ManageRoles),
            ),
            RouteEntry::guarded(
                "/admin/analytics",
                Requirement::role(Role::Admin).with_capability(Capability::ViewAnalytics),
            ),
        ])
    }
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Most specific entry for a path; query strings and fragments are ignored
    pub fn lookup(&self, path: &str) -> Option<&RouteEntry> {
        let path = path.split(&['?', '#'][..]).next().unwrap_or(path);

        self.entries
            .iter()
            .filter(|entry| entry.matches(path))
            .max_by_key(|entry| entry.path.len())
    }

    /// Guard decision for navigating to `path`
    pub fn decide(&self, state: &SessionState, path: &str) -> RouteDecision {
        match self.lookup(path).and_then(|entry| entry.requirement.as_ref()) {
            Some(requirement) => evaluate_route(state, requirement, path),
            None => RouteDecision::Allow,
        }
    }
}
