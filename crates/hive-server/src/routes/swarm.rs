//! Swarm credential routes.
//!
//! Each workspace may hold one swarm record whose API key is encrypted
//! under the `swarmApiKey` field binding. Configuration and key
//! resolution are admin-gated; a non-admin member sees the record's
//! metadata but can never obtain the key.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hive_core::envelope;

use crate::auth::Identity;
use crate::error::AppError;
use crate::repository;
use crate::routes::{credential_not_found, resolve_credential, resolve_workspace};
use crate::state::AppState;

/// Field binding for swarm API keys.
const SWARM_API_KEY_FIELD: &str = "swarmApiKey";

/// Request body for configuring the workspace swarm.
#[derive(Debug, Deserialize)]
pub struct SetSwarmRequest {
    pub name: String,
    pub api_key: String,
}

/// Swarm metadata — never includes key material.
#[derive(Debug, Serialize)]
pub struct SwarmResponse {
    pub name: String,
    pub has_api_key: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response for a resolved swarm API key.
#[derive(Debug, Serialize)]
pub struct SwarmApiKeyResponse {
    pub api_key: String,
}

/// Build the swarm router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/workspaces/{workspace}/swarm",
            get(get_swarm).put(set_swarm),
        )
        .route(
            "/workspaces/{workspace}/swarm/api-key",
            get(resolve_api_key),
        )
}

/// `PUT /v1/workspaces/{workspace}/swarm` — configure the swarm and store
/// a freshly encrypted API key envelope. Rotation replaces the envelope
/// wholesale.
async fn set_swarm(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
    Json(body): Json<SetSwarmRequest>,
) -> Result<Json<SwarmResponse>, AppError> {
    let (workspace, access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    if !access.can_admin {
        return Err(AppError::Forbidden(
            "admin access required to configure the swarm".to_owned(),
        ));
    }

    if body.name.is_empty() || body.name.len() > 128 {
        return Err(AppError::BadRequest(
            "name must be 1-128 characters".to_owned(),
        ));
    }
    if body.api_key.is_empty() {
        return Err(AppError::BadRequest("api_key is required".to_owned()));
    }

    let sealed = state
        .cipher
        .encrypt_field(SWARM_API_KEY_FIELD, &body.api_key)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let swarm = repository::upsert_swarm(
        &state.pool,
        workspace.id,
        &body.name,
        &envelope::serialize(&sealed),
        identity.user_id,
    )
    .await?;

    Ok(Json(SwarmResponse {
        name: swarm.name,
        has_api_key: swarm.api_key_ciphertext.is_some(),
        created_at: swarm.created_at,
        updated_at: swarm.updated_at,
    }))
}

/// `GET /v1/workspaces/{workspace}/swarm` — swarm metadata, no key.
async fn get_swarm(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
) -> Result<Json<SwarmResponse>, AppError> {
    let (workspace, _access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    let swarm = repository::get_swarm(&state.pool, workspace.id)
        .await?
        .ok_or_else(|| AppError::NotFound("swarm not configured".to_owned()))?;

    Ok(Json(SwarmResponse {
        name: swarm.name,
        has_api_key: swarm.api_key_ciphertext.is_some(),
        created_at: swarm.created_at,
        updated_at: swarm.updated_at,
    }))
}

/// `GET /v1/workspaces/{workspace}/swarm/api-key` — resolve the API key
/// for use.
///
/// Admin-gated. A missing record, an absent key, and a stored envelope
/// that fails to parse or decrypt all present as the same 404 — a caller
/// cannot learn whether a corrupt credential exists.
async fn resolve_api_key(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_ref): Path<String>,
) -> Result<Json<SwarmApiKeyResponse>, AppError> {
    let (workspace, access) =
        resolve_workspace(&state, &workspace_ref, identity.user_id).await?;

    if !access.can_admin {
        return Err(AppError::Forbidden(
            "admin access required to read the swarm API key".to_owned(),
        ));
    }

    let swarm = repository::get_swarm(&state.pool, workspace.id)
        .await?
        .ok_or_else(credential_not_found)?;

    let api_key = resolve_credential(
        &state.cipher,
        SWARM_API_KEY_FIELD,
        swarm.api_key_ciphertext.as_deref(),
        workspace.id,
    )?;

    Ok(Json(SwarmApiKeyResponse { api_key }))
}
