/// Named capabilities granted by roles
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single named capability. Wire names are the camelCase strings stored by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "canCreateContent")]
    CreateContent,
    #[serde(rename = "canVote")]
    Vote,
    #[serde(rename = "canComment")]
    Comment,
    #[serde(rename = "canReport")]
    Report,
    #[serde(rename = "canEditOwnContent")]
    EditOwnContent,
    #[serde(rename = "canDeleteOwnContent")]
    DeleteOwnContent,
    #[serde(rename = "canEditAnyContent")]
    EditAnyContent,
    #[serde(rename = "canDeleteAnyContent")]
    DeleteAnyContent,
    #[serde(rename = "canBanUsers")]
    BanUsers,
    #[serde(rename = "canHandleReports")]
    HandleReports,
    #[serde(rename = "canManageTags")]
    ManageTags,
    #[serde(rename = "canManageRoles")]
    ManageRoles,
    #[serde(rename = "canAccessAdminPanel")]
    AccessAdminPanel,
    #[serde(rename = "canManageSettings")]
    ManageSettings,
    #[serde(rename = "canViewAnalytics")]
    ViewAnalytics,
}

impl Capability {
    pub const ALL: [Capability; 15] = [
        Capability::CreateContent,
        Capability::Vote,
        Capability::Comment,
        Capability::Report,
        Capability::EditOwnContent,
        Capability::DeleteOwnContent,
        Capability::EditAnyContent,
        Capability::DeleteAnyContent,
        Capability::BanUsers,
        Capability::HandleReports,
        Capability::ManageTags,
        Capability::ManageRoles,
        Capability::AccessAdminPanel,
        Capability::ManageSettings,
        Capability::ViewAnalytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateContent => "canCreateContent",
            Capability::Vote => "canVote",
            Capability::Comment => "canComment",
            Capability::Report => "canReport",
            Capability::EditOwnContent => "canEditOwnContent",
            Capability::DeleteOwnContent => "canDeleteOwnContent",
            Capability::EditAnyContent => "canEditAnyContent",
            Capability::DeleteAnyContent => "canDeleteAnyContent",
            Capability::BanUsers => "canBanUsers",
            Capability::HandleReports => "canHandleReports",
            Capability::ManageTags => "canManageTags",
            Capability::ManageRoles => "canManageRoles",
            Capability::AccessAdminPanel => "canAccessAdminPanel",
            Capability::ManageSettings => "canManageSettings",
            Capability::ViewAnalytics => "canViewAnalytics",
        }
    }

    /// Look up a capability by its wire name. Unknown names are absent, not an error.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matches_wire_names() {
        for capability in Capability::ALL {
            assert_eq!(Capability::parse(capability.as_str()), Some(capability));
        }
        assert_eq!(Capability::parse("canModerateContent"), None);
        assert_eq!(Capability::parse("CANVOTE"), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Capability::HandleReports).unwrap();
        assert_eq!(json, "\"canHandleReports\"");
    }
}
