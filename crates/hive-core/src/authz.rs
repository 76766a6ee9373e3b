//! Ownership and role authorization.
//!
//! Every read or mutation of a tenant resource is gated by a decision from
//! [`OwnershipResolver`]. Decisions are produced fresh per request and
//! never cached — workspace membership can change between calls. Each
//! check performs one read-only resource lookup plus at most one
//! membership resolution through the injected [`Directory`] capability;
//! nothing blocks on another check and nothing is retried.
//!
//! Denials must not leak existence: a soft-deleted or missing resource and
//! a missing workspace produce the same shapes a caller without access
//! would see for data that never existed.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AuthzError, DirectoryError};
use crate::types::{Membership, Resource, ResourceKind, Workspace, WorkspaceRole};

/// Read-only lookup capability injected by the persistence layer.
///
/// Resource and workspace lookups must already exclude soft-deleted rows —
/// to the resolver, soft-deleted and absent are the same. Membership
/// lookups return the stored row even when the member has departed; the
/// departure rule belongs to the resolver.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Find a non-deleted resource by kind and id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Lookup`] if the underlying lookup fails.
    async fn find_resource(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<Option<Resource>, DirectoryError>;

    /// Find a non-deleted workspace by id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Lookup`] if the underlying lookup fails.
    async fn find_workspace(&self, id: Uuid) -> Result<Option<Workspace>, DirectoryError>;

    /// Find a non-deleted workspace by slug, or by id when the reference
    /// parses as a UUID.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Lookup`] if the underlying lookup fails.
    async fn find_workspace_by_ref(
        &self,
        slug_or_id: &str,
    ) -> Result<Option<Workspace>, DirectoryError>;

    /// Find the membership row for a user in a workspace, departed or not.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Lookup`] if the underlying lookup fails.
    async fn find_membership(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, DirectoryError>;
}

/// Why an access decision came out the way it did.
///
/// `NotFound` and `NotOwner` stay distinguishable here for logging; the
/// route layer may fold them into one external status per endpoint policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// The caller created the resource.
    Owner,
    /// A sufficiently privileged workspace role acted on a resource it did
    /// not create, at a call site that opted in.
    AdminOverride,
    /// The caller is neither the creator nor an eligible administrator.
    NotOwner,
    /// No such resource — absent or soft-deleted, indistinguishably.
    NotFound,
}

/// Immutable result of a per-resource authorization check.
///
/// Consumed by the request-handling layer to choose a response; choosing
/// status codes is not authorization's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub has_access: bool,
    pub is_owner: bool,
    pub can_modify: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    const fn owner() -> Self {
        Self {
            has_access: true,
            is_owner: true,
            can_modify: true,
            reason: AccessReason::Owner,
        }
    }

    const fn admin_override() -> Self {
        Self {
            has_access: true,
            is_owner: false,
            can_modify: true,
            reason: AccessReason::AdminOverride,
        }
    }

    const fn denied(reason: AccessReason) -> Self {
        Self {
            has_access: false,
            is_owner: false,
            can_modify: false,
            reason,
        }
    }
}

/// Per-call options for [`OwnershipResolver::validate_ownership`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipOptions {
    /// Allow a workspace `Admin` or `Owner` to act on a resource it did
    /// not create. Opt-in per call site — callers enforcing strict
    /// per-resource ownership leave this unset.
    pub allow_admin_override: bool,
}

/// Workspace-scoped access rights derived from the caller's effective role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceAccess {
    pub has_access: bool,
    pub can_read: bool,
    pub can_write: bool,
    pub can_admin: bool,
    pub role: Option<WorkspaceRole>,
}

impl WorkspaceAccess {
    /// Uniform deny — identical for a missing workspace, a soft-deleted
    /// workspace, and a caller with no live membership.
    pub const DENIED: Self = Self {
        has_access: false,
        can_read: false,
        can_write: false,
        can_admin: false,
        role: None,
    };

    const fn granted(role: WorkspaceRole) -> Self {
        Self {
            has_access: true,
            can_read: role.can_read(),
            can_write: role.can_write(),
            can_admin: role.can_admin(),
            role: Some(role),
        }
    }
}

/// Resolves ownership and role-based access for tenant resources.
pub struct OwnershipResolver {
    directory: Arc<dyn Directory>,
}

impl OwnershipResolver {
    /// Create a resolver over the given lookup capability.
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Decide whether `user_id` may act on a single resource.
    ///
    /// The creator always has access. Otherwise, when the call site opted
    /// in, a workspace `Admin` or the workspace owner may override.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Directory`] if a lookup fails; never retried.
    pub async fn validate_ownership(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
        options: OwnershipOptions,
    ) -> Result<AccessDecision, AuthzError> {
        let Some(resource) = self.directory.find_resource(kind, resource_id).await? else {
            return Ok(AccessDecision::denied(AccessReason::NotFound));
        };

        if resource.created_by == user_id {
            return Ok(AccessDecision::owner());
        }

        if options.allow_admin_override {
            let role = match self.directory.find_workspace(resource.workspace_id).await? {
                Some(workspace) => self.effective_role(&workspace, user_id).await?,
                None => None,
            };
            if role.is_some_and(WorkspaceRole::can_admin) {
                return Ok(AccessDecision::admin_override());
            }
        }

        Ok(AccessDecision::denied(AccessReason::NotOwner))
    }

    /// Decide workspace-scoped access for `user_id`.
    ///
    /// A workspace that is soft-deleted or has no matching slug/id denies
    /// identically to one the caller is simply not a member of.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Directory`] if a lookup fails; never retried.
    pub async fn validate_workspace_access(
        &self,
        slug_or_id: &str,
        user_id: Uuid,
    ) -> Result<WorkspaceAccess, AuthzError> {
        let Some(workspace) = self.directory.find_workspace_by_ref(slug_or_id).await? else {
            return Ok(WorkspaceAccess::DENIED);
        };

        match self.effective_role(&workspace, user_id).await? {
            Some(role) => Ok(WorkspaceAccess::granted(role)),
            None => Ok(WorkspaceAccess::DENIED),
        }
    }

    /// Resolve the caller's effective role in a workspace.
    ///
    /// The workspace owner carries an implicit `Owner` role without a
    /// membership row. A member whose `left_at` is set is not a member.
    async fn effective_role(
        &self,
        workspace: &Workspace,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AuthzError> {
        if workspace.owner_id == user_id {
            return Ok(Some(WorkspaceRole::Owner));
        }

        let membership = self
            .directory
            .find_membership(workspace.id, user_id)
            .await?;

        Ok(membership
            .filter(|m| m.left_at.is_none())
            .map(|m| m.role))
    }
}

impl std::fmt::Debug for OwnershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory directory for resolver tests.
    #[derive(Default)]
    struct MemoryDirectory {
        resources: Mutex<HashMap<Uuid, Resource>>,
        workspaces: Mutex<HashMap<Uuid, Workspace>>,
        memberships: Mutex<HashMap<(Uuid, Uuid), Membership>>,
    }

    #[async_trait::async_trait]
    impl Directory for MemoryDirectory {
        async fn find_resource(
            &self,
            kind: ResourceKind,
            id: Uuid,
        ) -> Result<Option<Resource>, DirectoryError> {
            Ok(self
                .resources
                .lock()
                .await
                .get(&id)
                .filter(|r| r.kind == kind)
                .cloned())
        }

        async fn find_workspace(&self, id: Uuid) -> Result<Option<Workspace>, DirectoryError> {
            Ok(self.workspaces.lock().await.get(&id).cloned())
        }

        async fn find_workspace_by_ref(
            &self,
            slug_or_id: &str,
        ) -> Result<Option<Workspace>, DirectoryError> {
            Ok(self
                .workspaces
                .lock()
                .await
                .values()
                .find(|w| w.slug == slug_or_id || w.id.to_string() == slug_or_id)
                .cloned())
        }

        async fn find_membership(
            &self,
            workspace_id: Uuid,
            user_id: Uuid,
        ) -> Result<Option<Membership>, DirectoryError> {
            Ok(self
                .memberships
                .lock()
                .await
                .get(&(workspace_id, user_id))
                .cloned())
        }
    }

    struct Fixture {
        resolver: OwnershipResolver,
        directory: Arc<MemoryDirectory>,
        workspace_id: Uuid,
        owner_id: Uuid,
        creator_id: Uuid,
        task_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let directory = Arc::new(MemoryDirectory::default());
        let workspace_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();

        directory.workspaces.lock().await.insert(
            workspace_id,
            Workspace {
                id: workspace_id,
                slug: "acme".to_owned(),
                owner_id,
            },
        );
        directory.resources.lock().await.insert(
            task_id,
            Resource {
                id: task_id,
                kind: ResourceKind::Task,
                workspace_id,
                created_by: creator_id,
            },
        );

        Fixture {
            resolver: OwnershipResolver::new(Arc::clone(&directory) as Arc<dyn Directory>),
            directory,
            workspace_id,
            owner_id,
            creator_id,
            task_id,
        }
    }

    async fn add_member(fx: &Fixture, user_id: Uuid, role: WorkspaceRole) {
        fx.directory.memberships.lock().await.insert(
            (fx.workspace_id, user_id),
            Membership {
                user_id,
                role,
                left_at: None,
            },
        );
    }

    #[tokio::test]
    async fn creator_has_access_without_any_role() {
        let fx = fixture().await;
        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                fx.task_id,
                fx.creator_id,
                OwnershipOptions::default(),
            )
            .await
            .unwrap();

        assert!(decision.has_access);
        assert!(decision.is_owner);
        assert!(decision.can_modify);
        assert_eq!(decision.reason, AccessReason::Owner);
    }

    #[tokio::test]
    async fn developer_without_override_is_denied() {
        let fx = fixture().await;
        let dev = Uuid::new_v4();
        add_member(&fx, dev, WorkspaceRole::Developer).await;

        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                fx.task_id,
                dev,
                OwnershipOptions::default(),
            )
            .await
            .unwrap();

        assert!(!decision.has_access);
        assert_eq!(decision.reason, AccessReason::NotOwner);
    }

    #[tokio::test]
    async fn admin_with_override_is_granted() {
        let fx = fixture().await;
        let admin = Uuid::new_v4();
        add_member(&fx, admin, WorkspaceRole::Admin).await;

        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                fx.task_id,
                admin,
                OwnershipOptions {
                    allow_admin_override: true,
                },
            )
            .await
            .unwrap();

        assert!(decision.has_access);
        assert!(!decision.is_owner);
        assert!(decision.can_modify);
        assert_eq!(decision.reason, AccessReason::AdminOverride);
    }

    #[tokio::test]
    async fn admin_without_override_is_denied() {
        let fx = fixture().await;
        let admin = Uuid::new_v4();
        add_member(&fx, admin, WorkspaceRole::Admin).await;

        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                fx.task_id,
                admin,
                OwnershipOptions::default(),
            )
            .await
            .unwrap();

        assert!(!decision.has_access);
        assert_eq!(decision.reason, AccessReason::NotOwner);
    }

    #[tokio::test]
    async fn pm_with_override_is_still_denied() {
        let fx = fixture().await;
        let pm = Uuid::new_v4();
        add_member(&fx, pm, WorkspaceRole::Pm).await;

        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                fx.task_id,
                pm,
                OwnershipOptions {
                    allow_admin_override: true,
                },
            )
            .await
            .unwrap();

        assert!(!decision.has_access);
        assert_eq!(decision.reason, AccessReason::NotOwner);
    }

    #[tokio::test]
    async fn workspace_owner_gets_admin_override_implicitly() {
        let fx = fixture().await;

        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                fx.task_id,
                fx.owner_id,
                OwnershipOptions {
                    allow_admin_override: true,
                },
            )
            .await
            .unwrap();

        assert!(decision.has_access);
        assert_eq!(decision.reason, AccessReason::AdminOverride);
    }

    #[tokio::test]
    async fn departed_admin_is_a_non_member() {
        let fx = fixture().await;
        let departed = Uuid::new_v4();
        fx.directory.memberships.lock().await.insert(
            (fx.workspace_id, departed),
            Membership {
                user_id: departed,
                role: WorkspaceRole::Admin,
                left_at: Some(Utc::now()),
            },
        );

        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                fx.task_id,
                departed,
                OwnershipOptions {
                    allow_admin_override: true,
                },
            )
            .await
            .unwrap();

        assert!(!decision.has_access);
        assert_eq!(decision.reason, AccessReason::NotOwner);
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let fx = fixture().await;
        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Task,
                Uuid::new_v4(),
                fx.creator_id,
                OwnershipOptions::default(),
            )
            .await
            .unwrap();

        assert!(!decision.has_access);
        assert_eq!(decision.reason, AccessReason::NotFound);
    }

    #[tokio::test]
    async fn wrong_kind_is_not_found() {
        let fx = fixture().await;
        let decision = fx
            .resolver
            .validate_ownership(
                ResourceKind::Feature,
                fx.task_id,
                fx.creator_id,
                OwnershipOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(decision.reason, AccessReason::NotFound);
    }

    #[tokio::test]
    async fn workspace_access_for_owner_is_full() {
        let fx = fixture().await;
        let access = fx
            .resolver
            .validate_workspace_access("acme", fx.owner_id)
            .await
            .unwrap();

        assert!(access.has_access);
        assert!(access.can_read && access.can_write && access.can_admin);
        assert_eq!(access.role, Some(WorkspaceRole::Owner));
    }

    #[tokio::test]
    async fn workspace_access_for_viewer_is_read_only() {
        let fx = fixture().await;
        let viewer = Uuid::new_v4();
        add_member(&fx, viewer, WorkspaceRole::Viewer).await;

        let access = fx
            .resolver
            .validate_workspace_access("acme", viewer)
            .await
            .unwrap();

        assert!(access.has_access);
        assert!(access.can_read);
        assert!(!access.can_write);
        assert!(!access.can_admin);
    }

    #[tokio::test]
    async fn workspace_access_by_id_reference_works() {
        let fx = fixture().await;
        let access = fx
            .resolver
            .validate_workspace_access(&fx.workspace_id.to_string(), fx.owner_id)
            .await
            .unwrap();

        assert!(access.has_access);
    }

    #[tokio::test]
    async fn unknown_workspace_denies_uniformly() {
        let fx = fixture().await;
        let access = fx
            .resolver
            .validate_workspace_access("no-such-workspace", fx.owner_id)
            .await
            .unwrap();

        assert_eq!(access, WorkspaceAccess::DENIED);
    }

    #[tokio::test]
    async fn non_member_denies_like_unknown_workspace() {
        let fx = fixture().await;
        let stranger = Uuid::new_v4();
        let access = fx
            .resolver
            .validate_workspace_access("acme", stranger)
            .await
            .unwrap();

        assert_eq!(access, WorkspaceAccess::DENIED);
    }
}
