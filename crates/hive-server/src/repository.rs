//! PostgreSQL queries for all server entities.
//!
//! Every function takes a `&PgPool` and returns `Result<T, AppError>`.
//! Queries use parameterized statements (sqlx) — no SQL injection risk.
//! Resource-reading queries are scoped to non-deleted rows; membership
//! reads return the stored row and leave the departure rule to the
//! authorization resolver.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use hive_core::authz::Directory;
use hive_core::error::DirectoryError;
use hive_core::types::{Membership, Resource, ResourceKind, WorkspaceRole};

use crate::error::AppError;
use crate::models::{Account, ApiToken, Feature, Swarm, Task, User, Workspace, WorkspaceMember};

// ── Users ────────────────────────────────────────────────────────────

/// Get a user by id.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the user does not exist.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_owned()))
}

// ── API tokens ───────────────────────────────────────────────────────

/// Look up an API token by its SHA-256 hash.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the token is unknown or revoked.
pub async fn lookup_api_token(pool: &PgPool, token_hash: &str) -> Result<ApiToken, AppError> {
    sqlx::query_as::<_, ApiToken>(
        "SELECT * FROM api_tokens WHERE token_hash = $1 AND revoked_at IS NULL",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Unauthorized("invalid or revoked API token".to_owned()))
}

/// Create an API token for a user.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn create_api_token(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    token_hash: &str,
    token_prefix: &str,
) -> Result<ApiToken, AppError> {
    let token = sqlx::query_as::<_, ApiToken>(
        r"INSERT INTO api_tokens (user_id, name, token_hash, token_prefix)
          VALUES ($1, $2, $3, $4)
          RETURNING *",
    )
    .bind(user_id)
    .bind(name)
    .bind(token_hash)
    .bind(token_prefix)
    .fetch_one(pool)
    .await?;

    Ok(token)
}

/// List a user's API tokens.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn list_api_tokens(pool: &PgPool, user_id: Uuid) -> Result<Vec<ApiToken>, AppError> {
    let tokens = sqlx::query_as::<_, ApiToken>(
        "SELECT * FROM api_tokens WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(tokens)
}

/// Revoke one of the user's own API tokens.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the token does not exist or belongs to
/// another user.
pub async fn revoke_api_token(pool: &PgPool, user_id: Uuid, token_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE api_tokens SET revoked_at = now() WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
    )
    .bind(token_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("API token not found".to_owned()));
    }

    Ok(())
}

// ── Workspaces ───────────────────────────────────────────────────────

/// Create a new workspace owned by `owner_id`.
///
/// # Errors
///
/// Returns `AppError::Conflict` if the slug is already taken.
pub async fn create_workspace(
    pool: &PgPool,
    name: &str,
    slug: &str,
    owner_id: Uuid,
) -> Result<Workspace, AppError> {
    let workspace = sqlx::query_as::<_, Workspace>(
        r"INSERT INTO workspaces (name, slug, owner_id)
          VALUES ($1, $2, $3)
          RETURNING *",
    )
    .bind(name)
    .bind(slug)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(workspace)
}

/// List non-deleted workspaces for a user (as owner or live member).
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn list_user_workspaces(pool: &PgPool, user_id: Uuid) -> Result<Vec<Workspace>, AppError> {
    let workspaces = sqlx::query_as::<_, Workspace>(
        r"SELECT w.* FROM workspaces w
          WHERE w.owner_id = $1 AND w.deleted = FALSE
          UNION
          SELECT w.* FROM workspaces w
          JOIN workspace_members m ON m.workspace_id = w.id
          WHERE m.user_id = $1 AND m.left_at IS NULL AND w.deleted = FALSE
          ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(workspaces)
}

/// Find a non-deleted workspace by slug, or by id when the reference
/// parses as a UUID.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn find_workspace_by_ref(
    pool: &PgPool,
    slug_or_id: &str,
) -> Result<Option<Workspace>, AppError> {
    let workspace = if let Ok(id) = Uuid::parse_str(slug_or_id) {
        sqlx::query_as::<_, Workspace>(
            "SELECT * FROM workspaces WHERE id = $1 AND deleted = FALSE",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as::<_, Workspace>(
            "SELECT * FROM workspaces WHERE slug = $1 AND deleted = FALSE",
        )
        .bind(slug_or_id)
        .fetch_optional(pool)
        .await?
    };

    Ok(workspace)
}

// ── Members ──────────────────────────────────────────────────────────

/// Add a member to a workspace, or restore a departed one with the new
/// role.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn add_member(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    role: WorkspaceRole,
) -> Result<WorkspaceMember, AppError> {
    let member = sqlx::query_as::<_, WorkspaceMember>(
        r"INSERT INTO workspace_members (workspace_id, user_id, role)
          VALUES ($1, $2, $3)
          ON CONFLICT (workspace_id, user_id) DO UPDATE SET
            role = EXCLUDED.role,
            left_at = NULL
          RETURNING *",
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    Ok(member)
}

/// List live members of a workspace.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn list_members(
    pool: &PgPool,
    workspace_id: Uuid,
) -> Result<Vec<WorkspaceMember>, AppError> {
    let members = sqlx::query_as::<_, WorkspaceMember>(
        "SELECT * FROM workspace_members WHERE workspace_id = $1 AND left_at IS NULL ORDER BY joined_at",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

/// Mark a member as departed.
///
/// # Errors
///
/// Returns `AppError::NotFound` if there is no live membership.
pub async fn remove_member(pool: &PgPool, workspace_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE workspace_members SET left_at = now() WHERE workspace_id = $1 AND user_id = $2 AND left_at IS NULL",
    )
    .bind(workspace_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("member not found".to_owned()));
    }

    Ok(())
}

// ── Tasks ────────────────────────────────────────────────────────────

/// Create a task in a workspace.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn create_task(
    pool: &PgPool,
    workspace_id: Uuid,
    title: &str,
    description: &str,
    created_by: Uuid,
) -> Result<Task, AppError> {
    let task = sqlx::query_as::<_, Task>(
        r"INSERT INTO tasks (workspace_id, title, description, created_by)
          VALUES ($1, $2, $3, $4)
          RETURNING *",
    )
    .bind(workspace_id)
    .bind(title)
    .bind(description)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(task)
}

/// Get a non-deleted task by id.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn get_task(pool: &PgPool, task_id: Uuid) -> Result<Option<Task>, AppError> {
    let task = sqlx::query_as::<_, Task>(
        r"SELECT t.* FROM tasks t
          JOIN workspaces w ON w.id = t.workspace_id AND w.deleted = FALSE
          WHERE t.id = $1 AND t.deleted = FALSE",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    Ok(task)
}

/// List non-deleted tasks in a workspace.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn list_tasks(pool: &PgPool, workspace_id: Uuid) -> Result<Vec<Task>, AppError> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE workspace_id = $1 AND deleted = FALSE ORDER BY created_at DESC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;

    Ok(tasks)
}

/// Update a task's title, description, and status.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the task does not exist or is deleted.
pub async fn update_task(
    pool: &PgPool,
    task_id: Uuid,
    title: &str,
    description: &str,
    status: &str,
) -> Result<Task, AppError> {
    sqlx::query_as::<_, Task>(
        r"UPDATE tasks
          SET title = $2, description = $3, status = $4, updated_at = now()
          WHERE id = $1 AND deleted = FALSE
          RETURNING *",
    )
    .bind(task_id)
    .bind(title)
    .bind(description)
    .bind(status)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("task not found".to_owned()))
}

/// Soft-delete a task. Soft-deleted tasks are invisible to every read
/// path, including authorization.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the task does not exist or is already
/// deleted.
pub async fn soft_delete_task(pool: &PgPool, task_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE tasks SET deleted = TRUE, deleted_at = now() WHERE id = $1 AND deleted = FALSE",
    )
    .bind(task_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("task not found".to_owned()));
    }

    Ok(())
}

// ── Features ─────────────────────────────────────────────────────────

/// Create a feature in a workspace.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn create_feature(
    pool: &PgPool,
    workspace_id: Uuid,
    title: &str,
    created_by: Uuid,
) -> Result<Feature, AppError> {
    let feature = sqlx::query_as::<_, Feature>(
        r"INSERT INTO features (workspace_id, title, created_by)
          VALUES ($1, $2, $3)
          RETURNING *",
    )
    .bind(workspace_id)
    .bind(title)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(feature)
}

/// Get a non-deleted feature by id.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn get_feature(pool: &PgPool, feature_id: Uuid) -> Result<Option<Feature>, AppError> {
    let feature = sqlx::query_as::<_, Feature>(
        r"SELECT f.* FROM features f
          JOIN workspaces w ON w.id = f.workspace_id AND w.deleted = FALSE
          WHERE f.id = $1 AND f.deleted = FALSE",
    )
    .bind(feature_id)
    .fetch_optional(pool)
    .await?;

    Ok(feature)
}

/// List non-deleted features in a workspace.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn list_features(pool: &PgPool, workspace_id: Uuid) -> Result<Vec<Feature>, AppError> {
    let features = sqlx::query_as::<_, Feature>(
        "SELECT * FROM features WHERE workspace_id = $1 AND deleted = FALSE ORDER BY created_at DESC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;

    Ok(features)
}

/// Update a feature's title and status.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the feature does not exist or is
/// deleted.
pub async fn update_feature(
    pool: &PgPool,
    feature_id: Uuid,
    title: &str,
    status: &str,
) -> Result<Feature, AppError> {
    sqlx::query_as::<_, Feature>(
        r"UPDATE features
          SET title = $2, status = $3, updated_at = now()
          WHERE id = $1 AND deleted = FALSE
          RETURNING *",
    )
    .bind(feature_id)
    .bind(title)
    .bind(status)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("feature not found".to_owned()))
}

/// Soft-delete a feature.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the feature does not exist or is
/// already deleted.
pub async fn soft_delete_feature(pool: &PgPool, feature_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE features SET deleted = TRUE, deleted_at = now() WHERE id = $1 AND deleted = FALSE",
    )
    .bind(feature_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("feature not found".to_owned()));
    }

    Ok(())
}

// ── Accounts ─────────────────────────────────────────────────────────

/// Link (or relink) a third-party account for a user in a workspace,
/// replacing any previous token envelope wholesale.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn upsert_account(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    provider: &str,
    access_token_ciphertext: &str,
) -> Result<Account, AppError> {
    let account = sqlx::query_as::<_, Account>(
        r"INSERT INTO accounts (workspace_id, user_id, provider, access_token_ciphertext)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (workspace_id, user_id, provider) DO UPDATE SET
            access_token_ciphertext = EXCLUDED.access_token_ciphertext,
            deleted = FALSE,
            deleted_at = NULL,
            updated_at = now()
          RETURNING id, workspace_id, user_id, provider, access_token_ciphertext, created_at, updated_at",
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(provider)
    .bind(access_token_ciphertext)
    .fetch_one(pool)
    .await?;

    Ok(account)
}

/// Get a non-deleted linked account by id.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn get_account(pool: &PgPool, account_id: Uuid) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>(
        r"SELECT a.id, a.workspace_id, a.user_id, a.provider, a.access_token_ciphertext, a.created_at, a.updated_at
          FROM accounts a
          JOIN workspaces w ON w.id = a.workspace_id AND w.deleted = FALSE
          WHERE a.id = $1 AND a.deleted = FALSE",
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Soft-delete (unlink) an account.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the account does not exist or is
/// already unlinked.
pub async fn soft_delete_account(pool: &PgPool, account_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE accounts SET deleted = TRUE, deleted_at = now() WHERE id = $1 AND deleted = FALSE",
    )
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("account not found".to_owned()));
    }

    Ok(())
}

// ── Swarms ───────────────────────────────────────────────────────────

/// Upsert a workspace's swarm record with a freshly encrypted API key
/// envelope. The envelope is replaced wholesale, never patched.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn upsert_swarm(
    pool: &PgPool,
    workspace_id: Uuid,
    name: &str,
    api_key_ciphertext: &str,
    created_by: Uuid,
) -> Result<Swarm, AppError> {
    let swarm = sqlx::query_as::<_, Swarm>(
        r"INSERT INTO swarms (workspace_id, name, api_key_ciphertext, created_by)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (workspace_id) DO UPDATE SET
            name = EXCLUDED.name,
            api_key_ciphertext = EXCLUDED.api_key_ciphertext,
            deleted = FALSE,
            deleted_at = NULL,
            updated_at = now()
          RETURNING id, workspace_id, name, api_key_ciphertext, created_at, updated_at",
    )
    .bind(workspace_id)
    .bind(name)
    .bind(api_key_ciphertext)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(swarm)
}

/// Get a workspace's swarm record.
///
/// # Errors
///
/// Returns `AppError::Internal` on database failure.
pub async fn get_swarm(pool: &PgPool, workspace_id: Uuid) -> Result<Option<Swarm>, AppError> {
    let swarm = sqlx::query_as::<_, Swarm>(
        "SELECT id, workspace_id, name, api_key_ciphertext, created_at, updated_at FROM swarms WHERE workspace_id = $1 AND deleted = FALSE",
    )
    .bind(workspace_id)
    .fetch_optional(pool)
    .await?;

    Ok(swarm)
}

// ── Directory ────────────────────────────────────────────────────────

/// Production [`Directory`] implementation over PostgreSQL.
///
/// All lookups exclude soft-deleted rows (and resources whose workspace
/// is soft-deleted); membership lookups return the stored row so the
/// resolver can apply the departure rule itself.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Create a directory over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convenience constructor returning the trait object the resolver
    /// expects.
    #[must_use]
    pub fn shared(pool: PgPool) -> Arc<dyn Directory> {
        Arc::new(Self::new(pool))
    }
}

impl std::fmt::Debug for PgDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDirectory").finish_non_exhaustive()
    }
}

fn lookup_error(err: &sqlx::Error) -> DirectoryError {
    DirectoryError::Lookup {
        reason: err.to_string(),
    }
}

#[async_trait::async_trait]
impl Directory for PgDirectory {
    async fn find_resource(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<Option<Resource>, DirectoryError> {
        let query = match kind {
            ResourceKind::Task => {
                r"SELECT t.workspace_id, t.created_by FROM tasks t
                  JOIN workspaces w ON w.id = t.workspace_id AND w.deleted = FALSE
                  WHERE t.id = $1 AND t.deleted = FALSE"
            }
            ResourceKind::Feature => {
                r"SELECT f.workspace_id, f.created_by FROM features f
                  JOIN workspaces w ON w.id = f.workspace_id AND w.deleted = FALSE
                  WHERE f.id = $1 AND f.deleted = FALSE"
            }
            ResourceKind::Account => {
                r"SELECT a.workspace_id, a.user_id FROM accounts a
                  JOIN workspaces w ON w.id = a.workspace_id AND w.deleted = FALSE
                  WHERE a.id = $1 AND a.deleted = FALSE"
            }
            ResourceKind::SwarmCredential => {
                r"SELECT s.workspace_id, s.created_by FROM swarms s
                  JOIN workspaces w ON w.id = s.workspace_id AND w.deleted = FALSE
                  WHERE s.id = $1 AND s.deleted = FALSE"
            }
        };

        let row: Option<(Uuid, Uuid)> = sqlx::query_as(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| lookup_error(&e))?;

        Ok(row.map(|(workspace_id, created_by)| Resource {
            id,
            kind,
            workspace_id,
            created_by,
        }))
    }

    async fn find_workspace(
        &self,
        id: Uuid,
    ) -> Result<Option<hive_core::types::Workspace>, DirectoryError> {
        let row: Option<(Uuid, String, Uuid)> = sqlx::query_as(
            "SELECT id, slug, owner_id FROM workspaces WHERE id = $1 AND deleted = FALSE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| lookup_error(&e))?;

        Ok(row.map(|(id, slug, owner_id)| hive_core::types::Workspace { id, slug, owner_id }))
    }

    async fn find_workspace_by_ref(
        &self,
        slug_or_id: &str,
    ) -> Result<Option<hive_core::types::Workspace>, DirectoryError> {
        let row: Option<(Uuid, String, Uuid)> = if let Ok(id) = Uuid::parse_str(slug_or_id) {
            sqlx::query_as(
                "SELECT id, slug, owner_id FROM workspaces WHERE id = $1 AND deleted = FALSE",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| lookup_error(&e))?
        } else {
            sqlx::query_as(
                "SELECT id, slug, owner_id FROM workspaces WHERE slug = $1 AND deleted = FALSE",
            )
            .bind(slug_or_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| lookup_error(&e))?
        };

        Ok(row.map(|(id, slug, owner_id)| hive_core::types::Workspace { id, slug, owner_id }))
    }

    async fn find_membership(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, DirectoryError> {
        let row: Option<(Uuid, String, Option<chrono::DateTime<chrono::Utc>>)> = sqlx::query_as(
            "SELECT user_id, role, left_at FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| lookup_error(&e))?;

        let Some((user_id, role_str, left_at)) = row else {
            return Ok(None);
        };

        // A role string this build does not know denies access rather than
        // granting anything or failing the request.
        match WorkspaceRole::from_str(&role_str) {
            Ok(role) => Ok(Some(Membership {
                user_id,
                role,
                left_at,
            })),
            Err(_) => {
                tracing::warn!(%workspace_id, %user_id, role = %role_str, "unknown stored role, denying");
                Ok(None)
            }
        }
    }
}
