//! Workspace management routes.
//!
//! Create and list workspaces, inspect a single workspace, and manage
//! members. The creator becomes the workspace owner and needs no
//! membership row.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hive_core::types::WorkspaceRole;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::{Workspace, WorkspaceMember};
use crate::repository;
use crate::routes::resolve_workspace;
use crate::state::AppState;

/// Request body for creating a workspace.
#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub slug: String,
}

/// Request body for adding a member.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: String,
}

/// Response for workspace listing.
#[derive(Debug, Serialize)]
pub struct WorkspaceListResponse {
    pub workspaces: Vec<Workspace>,
}

/// Response for a single workspace, with the caller's rights.
#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub workspace: Workspace,
    pub role: Option<WorkspaceRole>,
    pub can_write: bool,
    pub can_admin: bool,
}

/// Response for member listing.
#[derive(Debug, Serialize)]
pub struct MemberListResponse {
    pub members: Vec<WorkspaceMember>,
}

/// Build the workspaces router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workspaces", post(create_workspace).get(list_workspaces))
        .route("/workspaces/{workspace}", get(get_workspace))
        .route(
            "/workspaces/{workspace}/members",
            post(add_member).get(list_members),
        )
        .route(
            "/workspaces/{workspace}/members/{user_id}",
            axum::routing::delete(remove_member),
        )
}

/// `POST /v1/workspaces` — create a new workspace.
async fn create_workspace(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateWorkspaceRequest>,
) -> Result<Json<Workspace>, AppError> {
    if body.name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }
    if body.slug.is_empty() || body.slug.len() > 64 {
        return Err(AppError::BadRequest(
            "slug must be 1-64 characters".to_owned(),
        ));
    }

    let workspace =
        repository::create_workspace(&state.pool, &body.name, &body.slug, identity.user_id)
            .await?;

    Ok(Json(workspace))
}

/// `GET /v1/workspaces` — list workspaces for the current user.
async fn list_workspaces(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<WorkspaceListResponse>, AppError> {
    let workspaces = repository::list_user_workspaces(&state.pool, identity.user_id).await?;
    Ok(Json(WorkspaceListResponse { workspaces }))
}

/// `GET /v1/workspaces/{workspace}` — get a workspace by slug or id.
///
/// Missing, soft-deleted, and not-a-member all present as the same 404.
async fn get_workspace(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    let (workspace, access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    Ok(Json(WorkspaceResponse {
        workspace,
        role: access.role,
        can_write: access.can_write,
        can_admin: access.can_admin,
    }))
}

/// `POST /v1/workspaces/{workspace}/members` — add a member.
async fn add_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<Json<WorkspaceMember>, AppError> {
    let (workspace, access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    if !access.can_admin {
        return Err(AppError::Forbidden(
            "admin access required to manage members".to_owned(),
        ));
    }

    let role = WorkspaceRole::from_str(&body.role)
        .map_err(AppError::BadRequest)?;

    if role == WorkspaceRole::Owner {
        return Err(AppError::BadRequest(
            "the owner role is implicit and cannot be assigned".to_owned(),
        ));
    }

    let member =
        repository::add_member(&state.pool, workspace.id, body.user_id, role).await?;

    Ok(Json(member))
}

/// `GET /v1/workspaces/{workspace}/members` — list live members.
async fn list_members(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
) -> Result<Json<MemberListResponse>, AppError> {
    let (workspace, _access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    let members = repository::list_members(&state.pool, workspace.id).await?;
    Ok(Json(MemberListResponse { members }))
}

/// `DELETE /v1/workspaces/{workspace}/members/{user_id}` — mark a member
/// as departed. A departed member keeps their row but loses all access.
async fn remove_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((workspace_ref, user_id)): Path<(String, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (workspace, access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    // Members may leave on their own; removing anyone else is admin-only.
    if user_id != identity.user_id && !access.can_admin {
        return Err(AppError::Forbidden(
            "admin access required to remove members".to_owned(),
        ));
    }

    repository::remove_member(&state.pool, workspace.id, user_id).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
