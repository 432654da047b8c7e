/// Acting principal for a request or operation
use crate::{
    error::{AppError, AppResult},
    metrics,
    rbac::{self, Capability, Role},
};
use serde::Serialize;

/// Signed-in user with a resolved role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub uid: String,
    pub display_name: Option<String>,
    pub role: Role,
}

impl Viewer {
    pub fn new(uid: impl Into<String>, display_name: Option<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            display_name,
            role,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        rbac::can(Some(self.role), capability)
    }

    /// Fail with `Authorization` unless the role grants `capability`
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.can(capability) {
            return Ok(());
        }

        metrics::record_authorization_denied(capability.as_str());
        tracing::debug!(
            "Denied {} to {} with role {}",
            capability,
            self.uid,
            self.role
        );
        Err(AppError::Authorization(format!(
            "Role {} lacks {}",
            self.role, capability
        )))
    }
}

/// Early-return with `Authorization` unless the viewer holds the capability
#[macro_export]
macro_rules! require_capability {
    ($viewer:expr, $capability:expr) => {
        $viewer.require($capability)?
    };
}
