//! Shared domain types: workspaces, memberships, roles, and resources.
//!
//! Roles form a closed, totally ordered hierarchy so privilege checks are
//! exhaustive and compiler-checked rather than string comparisons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a workspace member.
///
/// Variants are declared from least to most privileged, so the derived
/// `Ord` matches the privilege ordering:
/// `Viewer < Stakeholder < Developer < Pm < Admin < Owner`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Viewer,
    Stakeholder,
    Developer,
    Pm,
    Admin,
    Owner,
}

impl WorkspaceRole {
    /// Every role, down to `Viewer`, satisfies read-only operations.
    #[must_use]
    pub const fn can_read(self) -> bool {
        true
    }

    /// Write operations require `Developer` or above.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::Developer | Self::Pm | Self::Admin | Self::Owner)
    }

    /// Administrative operations require `Admin` or the implicit `Owner`.
    #[must_use]
    pub const fn can_admin(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }

    /// Stable lowercase name, matching the persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Stakeholder => "stakeholder",
            Self::Developer => "developer",
            Self::Pm => "pm",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

impl std::fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkspaceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "stakeholder" => Ok(Self::Stakeholder),
            "developer" => Ok(Self::Developer),
            "pm" => Ok(Self::Pm),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            other => Err(format!("unknown workspace role: {other}")),
        }
    }
}

/// A workspace (tenant), as seen by the authorization resolver.
///
/// Soft-deleted workspaces are never produced by a [`crate::authz::Directory`]
/// lookup — absence and soft-deletion are indistinguishable here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub id: Uuid,
    pub slug: String,
    /// The workspace owner holds an implicit [`WorkspaceRole::Owner`] role
    /// without a membership row.
    pub owner_id: Uuid,
}

/// A workspace membership row, as stored.
///
/// `left_at` marks voluntary or administrative departure; the resolver
/// treats a departed member as not a member regardless of stored role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub user_id: Uuid,
    pub role: WorkspaceRole,
    pub left_at: Option<DateTime<Utc>>,
}

/// Kinds of per-workspace resources subject to ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Task,
    Feature,
    Account,
    SwarmCredential,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Feature => write!(f, "feature"),
            Self::Account => write!(f, "account"),
            Self::SwarmCredential => write!(f, "swarm_credential"),
        }
    }
}

/// A resource record, as seen by the authorization resolver.
///
/// Belongs to exactly one workspace. Soft-deleted resources are never
/// produced by a lookup — they are authorization-invisible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: Uuid,
    pub kind: ResourceKind,
    pub workspace_id: Uuid,
    /// The creating user — the resource owner.
    pub created_by: Uuid,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_ordering_matches_privilege() {
        assert!(WorkspaceRole::Viewer < WorkspaceRole::Stakeholder);
        assert!(WorkspaceRole::Stakeholder < WorkspaceRole::Developer);
        assert!(WorkspaceRole::Developer < WorkspaceRole::Pm);
        assert!(WorkspaceRole::Pm < WorkspaceRole::Admin);
        assert!(WorkspaceRole::Admin < WorkspaceRole::Owner);
    }

    #[test]
    fn viewer_reads_but_cannot_write() {
        assert!(WorkspaceRole::Viewer.can_read());
        assert!(!WorkspaceRole::Viewer.can_write());
        assert!(!WorkspaceRole::Viewer.can_admin());
    }

    #[test]
    fn developer_writes_but_cannot_admin() {
        assert!(WorkspaceRole::Developer.can_write());
        assert!(!WorkspaceRole::Developer.can_admin());
        assert!(!WorkspaceRole::Pm.can_admin());
    }

    #[test]
    fn admin_and_owner_can_admin() {
        assert!(WorkspaceRole::Admin.can_admin());
        assert!(WorkspaceRole::Owner.can_admin());
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            WorkspaceRole::Viewer,
            WorkspaceRole::Stakeholder,
            WorkspaceRole::Developer,
            WorkspaceRole::Pm,
            WorkspaceRole::Admin,
            WorkspaceRole::Owner,
        ] {
            assert_eq!(WorkspaceRole::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(
            WorkspaceRole::from_str("ADMIN").unwrap(),
            WorkspaceRole::Admin
        );
    }

    #[test]
    fn unknown_role_fails_to_parse() {
        assert!(WorkspaceRole::from_str("superuser").is_err());
    }
}
