/// Route and render guards
///
/// Pure decisions over a [`SessionState`]. While the session is initializing
/// or loading a role, guards answer `Pending`: they neither redirect nor
/// reveal protected content.

pub mod routes;

pub use routes::{RouteEntry, RouteTable};

use crate::{
    rbac::{self, Capability, Role},
    session::SessionState,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Where signed-out visitors are sent
pub const SIGN_IN_PATH: &str = "/login";

/// Where signed-in visitors without access are sent
pub const HOME_PATH: &str = "/";

/// Access requirement for a route or component. The default only requires a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub min_role: Option<Role>,
    pub capability: Option<Capability>,
}

impl Requirement {
    pub fn signed_in() -> Self {
        Self::default()
    }

    pub fn role(min_role: Role) -> Self {
        Self {
            min_role: Some(min_role),
            capability: None,
        }
    }

    pub fn capability(capability: Capability) -> Self {
        Self {
            min_role: None,
            capability: Some(capability),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Whether a signed-in user with `role` satisfies the requirement
    pub fn is_met_by(&self, role: Role) -> bool {
        let role_ok = self
            .min_role
            .map(|min_role| role.can_act_as(min_role))
            .unwrap_or(true);
        let capability_ok = self
            .capability
            .map(|capability| rbac::can(Some(role), capability))
            .unwrap_or(true);

        role_ok && capability_ok
    }
}

/// Outcome of guarding a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum RouteDecision {
    /// Session not settled; render a loading state
    Pending,
    Allow,
    #[serde(rename_all = "camelCase")]
    RedirectToSignIn { return_to: String },
    RedirectHome,
}

impl RouteDecision {
    /// Redirect target, if any
    pub fn location(&self) -> Option<String> {
        match self {
            RouteDecision::RedirectToSignIn { return_to } => Some(format!(
                "{}?redirect={}",
                SIGN_IN_PATH,
                urlencoding::encode(return_to)
            )),
            RouteDecision::RedirectHome => Some(HOME_PATH.to_string()),
            RouteDecision::Pending | RouteDecision::Allow => None,
        }
    }
}

/// Decide whether `requested_path` may be shown for the session
pub fn evaluate_route(
    state: &SessionState,
    requirement: &Requirement,
    requested_path: &str,
) -> RouteDecision {
    match state {
        SessionState::Initializing | SessionState::Loading { .. } => RouteDecision::Pending,
        SessionState::SignedOut => RouteDecision::RedirectToSignIn {
            return_to: requested_path.to_string(),
        },
        SessionState::Ready { role, .. } => {
            if requirement.is_met_by(*role) {
                RouteDecision::Allow
            } else {
                RouteDecision::RedirectHome
            }
        }
    }
}

/// Outcome of guarding a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Visible,
    Hidden,
    Pending,
}

impl Visibility {
    /// Pick what to render: `children` when visible, `fallback` when hidden,
    /// nothing while pending
    pub fn select<T>(self, children: T, fallback: Option<T>) -> Option<T> {
        match self {
            Visibility::Visible => Some(children),
            Visibility::Hidden => fallback,
            Visibility::Pending => None,
        }
    }
}

/// Render-guard form of [`evaluate_route`]
pub fn evaluate_render(state: &SessionState, requirement: &Requirement) -> Visibility {
    match state {
        SessionState::Initializing | SessionState::Loading { .. } => Visibility::Pending,
        SessionState::SignedOut => Visibility::Hidden,
        SessionState::Ready { role, .. } => {
            if requirement.is_met_by(*role) {
                Visibility::Visible
            } else {
                Visibility::Hidden
            }
        }
    }
}

/// Route guard that re-evaluates whenever the session, requirement or path changes
pub struct RouteGuard {
    session: watch::Receiver<SessionState>,
    requirement: Requirement,
    path: String,
}

impl RouteGuard {
    pub fn new(
        session: watch::Receiver<SessionState>,
        requirement: Requirement,
        path: impl Into<String>,
    ) -> Self {
        Self {
            session,
            requirement,
            path: path.into(),
        }
    }

    /// Decision for the current session state
    pub fn decision(&self) -> RouteDecision {
        evaluate_route(&self.session.borrow(), &self.requirement, &self.path)
    }

    pub fn set_requirement(&mut self, requirement: Requirement) -> RouteDecision {
        self.requirement = requirement;
        self.decision()
    }

    pub fn set_path(&mut self, path: impl Into<String>) -> RouteDecision {
        self.path = path.into();
        self.decision()
    }

    /// Wait for the next session change and re-evaluate.
    /// Returns `None` once the session context is gone.
    pub async fn changed(&mut self) -> Option<RouteDecision> {
        self.session.changed().await.ok()?;
        Some(self.decision())
    }

    /// Wait until the decision is no longer `Pending`
    pub async fn settled(&mut self) -> Option<RouteDecision> {
        loop {
            let decision = self.decision();
            if decision != RouteDecision::Pending {
                return Some(decision);
            }
            self.changed().await?;
        }
    }
}
