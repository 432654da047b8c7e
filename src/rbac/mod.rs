/// Role-based access control
///
/// Static role tables and the permission evaluator used by guards,
/// API extractors and the report workflow. Evaluation is pure and
/// synchronous so it can run on any code path.

pub mod capability;
pub mod roles;

pub use capability::Capability;
pub use roles::{union, PermissionSet, Role, ROLE_PERMISSIONS};

/// Check whether a role grants a capability.
///
/// An absent role grants nothing. A capability missing from the role's
/// table is denied; otherwise the stored flag is returned.
pub fn can(role: Option<Role>, capability: Capability) -> bool {
    match role {
        Some(role) => role.permissions().get(capability).unwrap_or(false),
        None => false,
    }
}

/// String form of [`can`] for roles and capabilities read from storage or requests
pub fn can_named(role: Option<&str>, capability: &str) -> bool {
    let role = role.and_then(Role::parse);
    match Capability::parse(capability) {
        Some(capability) => can(role, capability),
        None => false,
    }
}

/// Capabilities granted to a role
pub fn capabilities_of(role: Role) -> Vec<Capability> {
    role.permissions().granted()
}
