/// Community roles and their permission tables
use super::capability::Capability;
use crate::error::{AppError, AppResult};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Community role levels, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular member
    User,
    /// Handles reports and moderates any content
    Moderator,
    /// Full access, can grant and revoke roles
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        Self::parse(s).ok_or_else(|| AppError::Validation(format!("Invalid role: {}", s)))
    }

    /// Exact lookup; any other spelling yields `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Check if this role meets a minimum tier
    pub fn can_act_as(&self, required: Role) -> bool {
        self >= &required
    }

    /// The tier directly below this one
    pub fn lower(&self) -> Option<Role> {
        match self {
            Role::User => None,
            Role::Moderator => Some(Role::User),
            Role::Admin => Some(Role::Moderator),
        }
    }

    /// Capabilities introduced at this tier
    fn additions(&self) -> &'static [Capability] {
        match self {
            Role::User => &[
                Capability::CreateContent,
                Capability::Vote,
                Capability::Comment,
                Capability::Report,
                Capability::EditOwnContent,
                Capability::DeleteOwnContent,
            ],
            Role::Moderator => &[
                Capability::EditAnyContent,
                Capability::DeleteAnyContent,
                Capability::BanUsers,
                Capability::HandleReports,
                Capability::ManageTags,
            ],
            Role::Admin => &[
                Capability::ManageRoles,
                Capability::AccessAdminPanel,
                Capability::ManageSettings,
                Capability::ViewAnalytics,
            ],
        }
    }

    /// The immutable permission set for this role
    pub fn permissions(&self) -> &'static PermissionSet {
        &ROLE_PERMISSIONS[self]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from capability to grant flag for a single role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet(BTreeMap<Capability, bool>);

impl PermissionSet {
    /// Stored flag, or `None` when the capability is not in this table
    pub fn get(&self, capability: Capability) -> Option<bool> {
        self.0.get(&capability).copied()
    }

    /// Granted capabilities in declaration order
    pub fn granted(&self) -> Vec<Capability> {
        self.0
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(capability, _)| *capability)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        self.0.iter().map(|(c, g)| (*c, *g))
    }
}

/// Union of a base set with additional grants.
///
/// Entries already granted in `base` stay granted; additions can only widen the set.
pub fn union(base: &PermissionSet, additions: &[(Capability, bool)]) -> PermissionSet {
    let mut merged = base.0.clone();
    for (capability, granted) in additions {
        let entry = merged.entry(*capability).or_insert(false);
        *entry = *entry || *granted;
    }
    PermissionSet(merged)
}

fn build_table() -> BTreeMap<Role, PermissionSet> {
    let mut table: BTreeMap<Role, PermissionSet> = BTreeMap::new();
    for role in Role::ALL {
        let base = role
            .lower()
            .and_then(|lower| table.get(&lower).cloned())
            .unwrap_or_default();
        let additions: Vec<(Capability, bool)> =
            role.additions().iter().map(|c| (*c, true)).collect();
        table.insert(role, union(&base, &additions));
    }
    table
}

lazy_static! {
    /// Static role table, built once from the tier additions
    pub static ref ROLE_PERMISSIONS: BTreeMap<Role, PermissionSet> = build_table();
}
