//! Task routes.
//!
//! Creating and listing tasks is workspace-scoped; reading, updating, and
//! deleting a single task is resource-scoped through the ownership
//! resolver. Deletion opts into the admin override so a workspace admin
//! can clean up after a departed creator; update stays strictly
//! owner-only.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hive_core::authz::{AccessReason, OwnershipOptions};
use hive_core::types::ResourceKind;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::Task;
use crate::repository;
use crate::routes::resolve_workspace;
use crate::state::AppState;

/// Request body for creating a task.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for updating a task.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
}

/// Response for task listing.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

/// Build the tasks router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/workspaces/{workspace}/tasks",
            post(create_task).get(list_tasks),
        )
        .route(
            "/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

/// `POST /v1/workspaces/{workspace}/tasks` — create a task.
async fn create_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let (workspace, access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    if !access.can_write {
        return Err(AppError::Forbidden(
            "write access required to create tasks".to_owned(),
        ));
    }

    if body.title.is_empty() || body.title.len() > 512 {
        return Err(AppError::BadRequest(
            "title must be 1-512 characters".to_owned(),
        ));
    }

    let task = repository::create_task(
        &state.pool,
        workspace.id,
        &body.title,
        &body.description,
        identity.user_id,
    )
    .await?;

    Ok(Json(task))
}

/// `GET /v1/workspaces/{workspace}/tasks` — list tasks.
async fn list_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
) -> Result<Json<TaskListResponse>, AppError> {
    let (workspace, _access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    let tasks = repository::list_tasks(&state.pool, workspace.id).await?;
    Ok(Json(TaskListResponse { tasks }))
}

/// `GET /v1/tasks/{task_id}` — get a single task.
///
/// A task in a workspace the caller cannot read presents as the same 404
/// as a task that does not exist.
async fn get_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    let Some(task) = repository::get_task(&state.pool, task_id).await? else {
        return Err(AppError::NotFound("task not found".to_owned()));
    };

    let access = state
        .resolver
        .validate_workspace_access(&task.workspace_id.to_string(), identity.user_id)
        .await?;

    if !access.can_read {
        return Err(AppError::NotFound("task not found".to_owned()));
    }

    Ok(Json(task))
}

/// `PUT /v1/tasks/{task_id}` — update a task. Strictly owner-only: no
/// admin override at this call site.
async fn update_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let decision = state
        .resolver
        .validate_ownership(
            ResourceKind::Task,
            task_id,
            identity.user_id,
            OwnershipOptions::default(),
        )
        .await?;

    if !decision.has_access {
        return Err(match decision.reason {
            AccessReason::NotOwner => {
                AppError::Forbidden("only the task creator can update it".to_owned())
            }
            _ => AppError::NotFound("task not found".to_owned()),
        });
    }

    if body.title.is_empty() || body.title.len() > 512 {
        return Err(AppError::BadRequest(
            "title must be 1-512 characters".to_owned(),
        ));
    }

    let task = repository::update_task(
        &state.pool,
        task_id,
        &body.title,
        &body.description,
        &body.status,
    )
    .await?;

    Ok(Json(task))
}

/// `DELETE /v1/tasks/{task_id}` — soft-delete a task.
///
/// The creator may always delete; a workspace admin or owner may delete
/// another user's task through the admin override.
async fn delete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let decision = state
        .resolver
        .validate_ownership(
            ResourceKind::Task,
            task_id,
            identity.user_id,
            OwnershipOptions {
                allow_admin_override: true,
            },
        )
        .await?;

    if !decision.has_access {
        return Err(match decision.reason {
            AccessReason::NotOwner => {
                AppError::Forbidden("task can only be deleted by its creator or a workspace admin".to_owned())
            }
            _ => AppError::NotFound("task not found".to_owned()),
        });
    }

    if decision.reason == AccessReason::AdminOverride {
        tracing::info!(%task_id, user_id = %identity.user_id, "task deleted via admin override");
    }

    repository::soft_delete_task(&state.pool, task_id).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
